/// Maximum room name length (characters).
pub const MAX_ROOM_NAME_LENGTH: usize = 80;

/// Maximum room description length.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Maximum language tag length.
pub const MAX_LANGUAGE_LENGTH: usize = 32;

/// Maximum search query length.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 100;

/// Maximum display name length for a live connection.
pub const MAX_DISPLAY_NAME_LENGTH: usize = 64;

/// Validate a room name. Must be non-empty after trimming and within the length limit.
pub fn validate_room_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Room name cannot be empty".into());
    }
    if name.chars().count() > MAX_ROOM_NAME_LENGTH {
        return Err(format!(
            "Room name too long (max {} characters)",
            MAX_ROOM_NAME_LENGTH
        ));
    }
    Ok(())
}

/// Validate a description. Can be empty but has a length limit.
pub fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(format!(
            "Description too long (max {} characters)",
            MAX_DESCRIPTION_LENGTH
        ));
    }
    Ok(())
}

/// Validate a language tag.
pub fn validate_language(language: &str) -> Result<(), String> {
    if language.trim().is_empty() {
        return Err("Language cannot be empty".into());
    }
    if language.chars().count() > MAX_LANGUAGE_LENGTH {
        return Err(format!(
            "Language too long (max {} characters)",
            MAX_LANGUAGE_LENGTH
        ));
    }
    Ok(())
}

/// Validate a search query. The query is matched literally, so only length matters.
pub fn validate_search_query(query: &str) -> Result<(), String> {
    if query.chars().count() > MAX_SEARCH_QUERY_LENGTH {
        return Err(format!(
            "Search query too long (max {} characters)",
            MAX_SEARCH_QUERY_LENGTH
        ));
    }
    Ok(())
}

/// Validate the display name a live connection announces.
pub fn validate_display_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Display name cannot be empty".into());
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(format!(
            "Display name too long (max {} characters)",
            MAX_DISPLAY_NAME_LENGTH
        ));
    }
    Ok(())
}
