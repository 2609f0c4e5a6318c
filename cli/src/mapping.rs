// SPDX-License-Identifier: MPL-2.0

use std::path::Path;

use kdl::{KdlDocument, KdlError};
use vdagent_display::ConnectorMapping;

/// Reads a mapping file made of `connector "NAME" display=ID` nodes.
pub fn load(path: &Path) -> Result<ConnectorMapping, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|why| format!("could not read {}: {why}", path.display()))?;

    parse(&text).map_err(|why| format!("{} is not valid KDL: {why}", path.display()))
}

/// Invalid nodes are skipped with a warning.
pub fn parse(text: &str) -> Result<ConnectorMapping, KdlError> {
    let document = text.parse::<KdlDocument>()?;
    let mut mapping = ConnectorMapping::new();

    for node in document.nodes() {
        if node.name().value() != "connector" {
            tracing::warn!(node = node.name().value(), "ignoring unknown mapping node");
            continue;
        }

        // The first value is the connector name
        let Some(connector) = node
            .entries()
            .first()
            .filter(|entry| entry.name().is_none())
            .and_then(|entry| entry.value().as_string())
        else {
            tracing::warn!("connector node without a name");
            continue;
        };

        let display_id = node
            .entries()
            .iter()
            .find(|entry| entry.name().map(kdl::KdlIdentifier::value) == Some("display"))
            .and_then(|entry| entry.value().as_integer())
            .and_then(|display_id| u32::try_from(display_id).ok());

        let Some(display_id) = display_id else {
            tracing::warn!(connector, "connector node without a valid display id");
            continue;
        };

        if let Some((other, _)) = mapping
            .iter()
            .find(|&(other, id)| id == display_id && other != connector)
        {
            tracing::warn!(connector, other, display_id, "display shared by two connectors");
        }

        if let Some(previous) = mapping.insert(connector, display_id) {
            tracing::warn!(connector, previous, display_id, "connector mapped twice");
        }
    }

    Ok(mapping)
}

/// Parses a `CONNECTOR=ID` command line pair.
pub fn parse_pair(arg: &str) -> Result<(String, u32), String> {
    let (connector, display) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected CONNECTOR=ID, found `{arg}`"))?;

    if connector.is_empty() {
        return Err("connector name is empty".into());
    }

    let display = display
        .parse::<u32>()
        .map_err(|why| format!("invalid display id `{display}`: {why}"))?;

    Ok((connector.to_owned(), display))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_nodes() {
        let mapping = parse(
            r#"
            connector "Virtual-1" display=0
            connector "Virtual-2" display=1
            "#,
        )
        .unwrap();

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("Virtual-1"), Some(0));
        assert_eq!(mapping.get("Virtual-2"), Some(1));
    }

    #[test]
    fn invalid_nodes_are_skipped() {
        let mapping = parse(
            r#"
            output "Virtual-1" display=0
            connector display=1
            connector "Virtual-2"
            connector "Virtual-3" display=-1
            connector "Virtual-4" display=3
            "#,
        )
        .unwrap();

        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("Virtual-4"), Some(3));
    }

    #[test]
    fn large_and_repeated_ids() {
        let mapping = parse(
            r#"
            connector "Virtual-1" display=4294967296
            connector "Virtual-2" display=4294967295
            connector "Virtual-3" display=1
            connector "Virtual-3" display=2
            "#,
        )
        .unwrap();

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("Virtual-1"), None);
        assert_eq!(mapping.get("Virtual-2"), Some(u32::MAX));
        assert_eq!(mapping.get("Virtual-3"), Some(2));
    }

    #[test]
    fn syntax_errors() {
        assert!(parse("connector \"Virtual-1").is_err());
    }

    #[test]
    fn pairs() {
        assert_eq!(parse_pair("DP-1=2"), Ok(("DP-1".to_owned(), 2)));
        assert!(parse_pair("DP-1").is_err());
        assert!(parse_pair("=2").is_err());
        assert!(parse_pair("DP-1=x").is_err());
    }
}
