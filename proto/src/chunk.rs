use crate::constants::CHUNK_SUFFIX;

pub fn chunk_name(file_name: &str, sequence_number: i32) -> String {
    format!("{file_name}{CHUNK_SUFFIX}{sequence_number}")
}

/// Splits a chunk name into its file name and sequence number.
///
/// The split happens at the last `_chunk` that is followed only by decimal
/// digits, so file names that themselves contain `_chunk` still parse.
pub fn parse_chunk_name(name: &str) -> Option<(&str, i32)> {
    let index = name.rfind(CHUNK_SUFFIX)?;
    let (file_name, rest) = name.split_at(index);
    let digits = &rest[CHUNK_SUFFIX.len()..];
    if file_name.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let sequence_number = digits.parse::<i32>().ok()?;
    Some((file_name, sequence_number))
}
