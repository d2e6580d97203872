use crate::models::channel::ChannelKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connected,
    Reconnecting,
    #[default]
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl ConnectionStatus {
    pub fn color(&self) -> Rgb {
        match self {
            ConnectionStatus::Connected => Rgb(60, 180, 75),
            ConnectionStatus::Reconnecting => Rgb(255, 165, 0),
            ConnectionStatus::Disconnected => Rgb(220, 53, 69),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Reconnecting => "Reconnecting...",
            ConnectionStatus::Disconnected => "Disconnected",
        }
    }
}

impl ChannelKind {
    pub fn icon(&self) -> &str {
        match self {
            ChannelKind::Text => "#",
            ChannelKind::Voice => "🔊",
        }
    }
}

/// Two-letter avatar initials. One word gives its first two letters, several
/// give the first letters of the first and last word. Blank names give `?`.
pub fn initials(name: &str) -> String {
    let words = name.split_whitespace().collect::<Vec<_>>();

    match words.as_slice() {
        [] => "?".to_string(),
        [word] => word.chars().take(2).collect::<String>().to_uppercase(),
        [first, .., last] => first
            .chars()
            .take(1)
            .chain(last.chars().take(1))
            .collect::<String>()
            .to_uppercase(),
    }
}
