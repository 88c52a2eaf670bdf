//! Provider ID parsing
//!
//! Nodes carry an opaque `spec.providerID` of the form
//! `gce://<project>/<zone>/<instance>`; the zone and instance name are what
//! the cloud lookup needs.

use crate::Error;

const PROVIDER_ID_SCHEME: &str = "gce://";

/// A parsed node provider ID
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderId {
    /// Cloud project
    pub project: String,
    /// Zone the VM runs in
    pub zone: String,
    /// VM instance name
    pub instance: String,
}

impl std::str::FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(PROVIDER_ID_SCHEME)
            .ok_or_else(|| Error::ProviderIdFormat(s.to_string()))?;
        match rest.split('/').collect::<Vec<_>>().as_slice() {
            [project, zone, instance]
                if !project.is_empty() && !zone.is_empty() && !instance.is_empty() =>
            {
                Ok(Self {
                    project: project.to_string(),
                    zone: zone.to_string(),
                    instance: instance.to_string(),
                })
            }
            _ => Err(Error::ProviderIdFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{PROVIDER_ID_SCHEME}{}/{}/{}",
            self.project, self.zone, self.instance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_well_formed_id() {
        let id = ProviderId::from_str("gce://test-project/us-central1-b/test").unwrap();
        assert_eq!(id.project, "test-project");
        assert_eq!(id.zone, "us-central1-b");
        assert_eq!(id.instance, "test");
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in [
            "",
            "test",
            "gce://",
            "gce://project",
            "gce://project/zone",
            "gce://project/zone/",
            "gce:///zone/instance",
            "gce://project/zone/instance/extra",
            "aws://project/zone/instance",
        ] {
            let err = ProviderId::from_str(bad).unwrap_err();
            assert!(
                err.to_string().contains("unparseable providerID"),
                "expected format error for {bad:?}, got: {err}"
            );
        }
    }

    #[test]
    fn display_round_trips() {
        let raw = "gce://test-project/us-central1-b/test";
        assert_eq!(ProviderId::from_str(raw).unwrap().to_string(), raw);
    }
}
