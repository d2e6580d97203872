use crate::utils::error::{AppError, AppResult};

pub const MAX_MESSAGE_LEN: usize = 2000;

fn is_printable(s: &str) -> bool {
    s.chars().all(|c| !c.is_control())
}

pub fn validate_username(username: &str) -> AppResult<()> {
    if username.trim().is_empty() {
        return Err(AppError::Validation("Username cannot be empty".to_string()));
    }

    if username.len() > 64 {
        return Err(AppError::Validation(
            "Username must be at most 64 characters long".to_string(),
        ));
    }

    if !username.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err(AppError::Validation(
            "Username must contain only printable ASCII characters".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::Validation("Password cannot be empty".to_string()));
    }

    if password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters long".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_server_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation(
            "Server name cannot be empty".to_string(),
        ));
    }

    if name.chars().count() > 100 {
        return Err(AppError::Validation(
            "Server name must be at most 100 characters long".to_string(),
        ));
    }

    if !is_printable(name) {
        return Err(AppError::Validation(
            "Server name must not contain control characters".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_channel_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation(
            "Channel name cannot be empty".to_string(),
        ));
    }

    if name.chars().count() > 100 {
        return Err(AppError::Validation(
            "Channel name must be at most 100 characters long".to_string(),
        ));
    }

    if !is_printable(name) {
        return Err(AppError::Validation(
            "Channel name must not contain control characters".to_string(),
        ));
    }

    Ok(())
}

/// Content may be blank only when the message carries an attachment.
pub fn validate_message_content(content: &str, has_attachment: bool) -> AppResult<()> {
    if content.trim().is_empty() && !has_attachment {
        return Err(AppError::Validation(
            "Message must have content or an attachment".to_string(),
        ));
    }

    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::Validation(format!(
            "Message content must be at most {} characters long",
            MAX_MESSAGE_LEN
        )));
    }

    Ok(())
}
