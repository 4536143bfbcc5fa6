/// Turns a profile reference (URL or bare handle) into the handle itself.
///
/// Strips one trailing `/` and returns whatever follows the last remaining `/`.
/// `"https://www.instagram.com/name/"` and `"name"` both give `"name"`.
pub fn extract_handle(reference: &str) -> &str {
    let trimmed = reference.strip_suffix('/').unwrap_or(reference);
    trimmed.rsplit('/').next().unwrap_or_default()
}
