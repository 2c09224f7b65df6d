// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Export location selection and parsing.

use thiserror::Error;

use crate::domain::share::ExportLocation;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportLocationError {
    #[error("export locations list is empty")]
    Empty,

    #[error("no export location matches the selection policy")]
    NoMatch,

    #[error("failed to parse address and location from export location '{0}'")]
    MalformedPath(String),
}

/// Accepts every export location
pub fn any_export_location(_location: &ExportLocation) -> bool {
    true
}

/// Accepts export locations usable by regular tenants
pub fn non_admin_export_location(location: &ExportLocation) -> bool {
    !location.is_admin_only
}

/// Pick an export location
///
/// Among the locations accepted by `predicate`, the first one flagged as
/// preferred wins; otherwise the first accepted one.
///
/// # Returns
/// * `Ok(usize)` - Index into `locations`
/// * `Err(ExportLocationError)` if the list is empty or nothing matches
pub fn find_export_location<P>(locations: &[ExportLocation], predicate: P) -> Result<usize, ExportLocationError>
where
    P: Fn(&ExportLocation) -> bool,
{
    if locations.is_empty() {
        return Err(ExportLocationError::Empty);
    }

    let mut first_match = None;

    for (idx, location) in locations.iter().enumerate() {
        if !predicate(location) {
            continue;
        }
        if location.preferred {
            return Ok(idx);
        }
        if first_match.is_none() {
            first_match = Some(idx);
        }
    }

    first_match.ok_or(ExportLocationError::NoMatch)
}

/// Split an export path at its last `:` into (address, location)
///
/// `10.0.0.1:6789,10.0.0.2:6789:/volumes/_nogroup/abc` yields
/// `("10.0.0.1:6789,10.0.0.2:6789", "/volumes/_nogroup/abc")`.
pub fn split_export_location_path(path: &str) -> Result<(&str, &str), ExportLocationError> {
    match path.rfind(':') {
        Some(pos) if pos > 0 => Ok((&path[..pos], &path[pos + 1..])),
        _ => Err(ExportLocationError::MalformedPath(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(path: &str, preferred: bool, is_admin_only: bool) -> ExportLocation {
        ExportLocation {
            id: String::new(),
            path: path.to_string(),
            share_instance_id: String::new(),
            is_admin_only,
            preferred,
        }
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(find_export_location(&[], any_export_location), Err(ExportLocationError::Empty));
    }

    #[test]
    fn test_preferred_wins_over_earlier_match() {
        let locations = vec![
            location("a:/x", false, false),
            location("b:/x", true, false),
            location("c:/x", true, false),
        ];
        assert_eq!(find_export_location(&locations, any_export_location), Ok(1));
    }

    #[test]
    fn test_falls_back_to_first_match() {
        let locations = vec![
            location("admin:/x", true, true),
            location("a:/x", false, false),
            location("b:/x", false, false),
        ];
        assert_eq!(find_export_location(&locations, non_admin_export_location), Ok(1));

        let admin_only = vec![location("admin:/x", false, true)];
        assert_eq!(
            find_export_location(&admin_only, non_admin_export_location),
            Err(ExportLocationError::NoMatch)
        );
    }

    #[test]
    fn test_split_export_location_path() {
        assert_eq!(
            split_export_location_path("10.0.0.1:6789,10.0.0.2:6789:/volumes/_nogroup/abc"),
            Ok(("10.0.0.1:6789,10.0.0.2:6789", "/volumes/_nogroup/abc"))
        );
        assert_eq!(
            split_export_location_path("nfs.example.com:/shares/share-1"),
            Ok(("nfs.example.com", "/shares/share-1"))
        );
        assert!(split_export_location_path("/no/address").is_err());
        assert!(split_export_location_path(":/leading").is_err());
    }
}
