/// Serde helper for `#[serde(default = "crate::serde_defaults::schema_version")]`.
///
/// Snapshots persisted before the field existed are treated as the first schema.
pub(crate) const fn schema_version() -> u32 {
    1
}
