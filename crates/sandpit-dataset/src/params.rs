//! Flat `key,value,key,value,...` parameter lists.

use std::collections::BTreeMap;

use crate::error::ParamError;

/// Separator between list entries.
pub const LIST_SEPARATOR: char = ',';

/// Split a raw form value into list entries.
///
/// `None` and the empty string both mean "not provided".
pub fn split_flat_list(raw: Option<&str>) -> Option<Vec<String>> {
    match raw {
        None | Some("") => None,
        Some(s) => Some(s.split(LIST_SEPARATOR).map(str::to_string).collect()),
    }
}

/// Turn `[k1, v1, k2, v2, ...]` into a mapping.
///
/// Later duplicate keys overwrite earlier ones. An odd-length list is an
/// error and yields no mapping at all; an empty list yields an empty map.
pub fn parse_flat_pairs<S: AsRef<str>>(
    field: &str,
    parts: &[S],
) -> Result<BTreeMap<String, String>, ParamError> {
    if parts.len() % 2 != 0 {
        return Err(ParamError::OddLength {
            field: field.to_string(),
            count: parts.len(),
        });
    }

    Ok(parts
        .chunks_exact(2)
        .map(|pair| (pair[0].as_ref().to_string(), pair[1].as_ref().to_string()))
        .collect())
}

/// Split and parse a raw form value in one step.
pub fn parse_flat_list(
    field: &str,
    raw: Option<&str>,
) -> Result<Option<BTreeMap<String, String>>, ParamError> {
    split_flat_list(raw)
        .map(|parts| parse_flat_pairs(field, &parts))
        .transpose()
}
