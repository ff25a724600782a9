use crate::Source;

/// Strips whichever namespace prefix matches first and prepends the source's internal prefix.
/// IDs without a recognized namespace (`r123`, `9:55`, empty) are assumed to be internal already
/// and returned as-is.
///
/// For composite keys like `1:R826_1:9,2`, only the part before the first `_` is transformed.
pub fn to_internal_id(api_id: &str, source: &Source) -> String {
    if api_id.is_empty() {
        return api_id.to_string();
    }
    if let Some((base, suffix)) = api_id.split_once('_') {
        return format!("{}_{}", to_internal_id(base, source), suffix);
    }
    match source.strip_namespace(api_id) {
        Some(rest) => format!("{}{}", source.internal_prefix, rest),
        None => api_id.to_string(),
    }
}

/// The inverse of `to_internal_id`. Always produces the source's primary namespace, so secondary
/// namespaces don't survive a round trip.
pub fn to_api_id(internal_id: &str, source: &Source) -> String {
    if internal_id.is_empty() {
        return internal_id.to_string();
    }
    if let Some((base, suffix)) = internal_id.split_once('_') {
        return format!("{}_{}", to_api_id(base, source), suffix);
    }

    let mut rest = internal_id;
    if !source.internal_prefix.is_empty() {
        if let Some(x) = rest.strip_prefix(source.internal_prefix.as_str()) {
            rest = x;
        }
    }
    // Something might've been restored already
    if let Some(x) = source.strip_namespace(rest) {
        rest = x;
    }
    if rest.is_empty() {
        return internal_id.to_string();
    }
    format!("{}{}", source.primary_namespace(), rest)
}

/// The number identifying a stop within its source, used to keep tables sorted. IDs that aren't
/// numeric sort as 0.
pub fn numeric_suffix(id: &str, source: &Source) -> u64 {
    let internal = to_internal_id(id, source);
    let rest = internal
        .strip_prefix(source.internal_prefix.as_str())
        .unwrap_or(internal.as_str());
    rest.parse::<u64>().unwrap_or(0)
}
