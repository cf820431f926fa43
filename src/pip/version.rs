use std::fmt;

/// Release triple extracted from a pip version string.
///
/// Qualifiers (pre/dev/post releases, local segments, epochs) are dropped,
/// so `2.0.0rc1` and `2.0.0` compare equal. `(0, 0, 0)` is the sentinel for
/// "could not parse".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParsedVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ParsedVersion {
    pub const UNPARSEABLE: ParsedVersion = ParsedVersion::new(0, 0, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses any version string. Never fails; garbage yields the sentinel.
    pub fn parse(version: &str) -> Self {
        Self::try_parse(version).unwrap_or_else(|| {
            log::debug!("Could not parse version: {version:?}");
            Self::UNPARSEABLE
        })
    }

    fn try_parse(version: &str) -> Option<Self> {
        let mut rest = version;

        if let Some((_epoch, release)) = rest.split_once(':') {
            rest = release;
        }
        if let Some((public, _local)) = rest.split_once('+') {
            rest = public;
        }
        if let Some(idx) = rest.find(|c: char| c.is_ascii_alphabetic()) {
            rest = &rest[..idx];
        }

        let mut parts = rest.split('.');
        let major = parse_component(parts.next())?;
        let minor = parse_component(parts.next())?;
        let patch = parse_component(parts.next())?;

        Some(Self::new(major, minor, patch))
    }

    pub fn is_unparseable(&self) -> bool {
        *self == Self::UNPARSEABLE
    }
}

/// Missing components default to zero; present-but-invalid ones abort the parse.
fn parse_component(part: Option<&str>) -> Option<u64> {
    match part {
        None => Some(0),
        Some(raw) => raw.trim().parse::<u64>().ok(),
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(version: &str) -> (u64, u64, u64) {
        let v = ParsedVersion::parse(version);
        (v.major, v.minor, v.patch)
    }

    #[test]
    fn parses_plain_and_short_versions() {
        assert_eq!(triple("1.2.3"), (1, 2, 3));
        assert_eq!(triple("1.2"), (1, 2, 0));
        assert_eq!(triple("7"), (7, 0, 0));
        assert_eq!(triple("1.2.3.4"), (1, 2, 3));
    }

    #[test]
    fn drops_pre_dev_and_post_qualifiers() {
        assert_eq!(triple("2.0.0a1"), (2, 0, 0));
        assert_eq!(triple("1.0.0b2"), (1, 0, 0));
        assert_eq!(triple("1.0.0rc1"), (1, 0, 0));
        assert_eq!(triple("1.2.3.dev0"), (1, 2, 3));
        assert_eq!(triple("1.2.3.post1"), (1, 2, 3));
    }

    #[test]
    fn strips_epoch_and_local_segments() {
        assert_eq!(triple("1:2.0.0"), (2, 0, 0));
        assert_eq!(triple("1.2.3+local.4"), (1, 2, 3));
        assert_eq!(triple("2:1.4+ubuntu1"), (1, 4, 0));
    }

    #[test]
    fn unparseable_input_yields_sentinel() {
        for garbage in ["", "abc", "latest", "1..2", "-1.0", ".5", "1.x.3", "::", "+"] {
            assert!(
                ParsedVersion::parse(garbage).is_unparseable(),
                "{garbage:?} should be unparseable"
            );
        }
    }

    #[test]
    fn overflowing_component_is_unparseable() {
        assert!(ParsedVersion::parse("99999999999999999999999.1").is_unparseable());
    }

    #[test]
    fn prerelease_and_release_compare_equal() {
        assert_eq!(
            ParsedVersion::parse("2.0.0rc1"),
            ParsedVersion::parse("2.0.0")
        );
        assert!(ParsedVersion::parse("1.10.0") > ParsedVersion::parse("1.9.7"));
    }

    mod properties {
        use super::super::ParsedVersion;
        use proptest::prelude::*;

        proptest! {
            /// Any input parses without panicking; blank input is always the sentinel
            #[test]
            fn parse_is_total(raw in any::<String>()) {
                let parsed = ParsedVersion::parse(&raw);
                prop_assert!(!raw.trim().is_empty() || parsed.is_unparseable());
            }

            /// Plain dotted triples come back unchanged
            #[test]
            fn release_triples_round_trip(
                major in 0u64..10_000,
                minor in 0u64..10_000,
                patch in 0u64..10_000
            ) {
                let parsed = ParsedVersion::parse(&format!("{major}.{minor}.{patch}"));
                prop_assert_eq!(parsed, ParsedVersion::new(major, minor, patch));
            }

            /// Local segments and qualifiers never change the release triple
            #[test]
            fn qualifiers_are_ignored(
                release in "[0-9]{1,4}\\.[0-9]{1,4}\\.[0-9]{1,4}",
                qualifier in "(a|b|rc|\\.dev|\\.post)[0-9]{0,3}",
                local in "[a-z0-9]{1,8}"
            ) {
                let plain = ParsedVersion::parse(&release);
                let decorated = format!("{release}{qualifier}+{local}");
                prop_assert_eq!(ParsedVersion::parse(&decorated), plain);
            }
        }
    }
}
