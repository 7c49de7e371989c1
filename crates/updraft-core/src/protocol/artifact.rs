use std::io::BufRead;

use super::{for_each_record, skip, Flow, ParseContext};
use crate::{ArtifactCatalog, ContentNode, Digest, DigestAlgorithm, ProtocolError};
use crate::{RuntimeVersion, VersionWindow};

/// Parses a release's `catalog.txt` (also the installed `app/catalog.txt`).
pub fn parse_artifact_catalog<R: BufRead>(
    reader: R,
    ctx: &ParseContext,
) -> Result<ArtifactCatalog, ProtocolError> {
    let mut catalog = ArtifactCatalog::new();
    let mut algorithm = DigestAlgorithm::Md5;

    for_each_record(reader, ctx, |record| {
        match record.kind() {
            "name" => {}
            "exit" => {
                if ctx.should_exit(&record.fields()) {
                    return Flow::Stop;
                }
            }
            "digest" => match record.fields().as_slice() {
                [_, name] => match DigestAlgorithm::parse(name) {
                    Ok(parsed) => algorithm = parsed,
                    Err(err) => skip(ctx, record, &err.to_string()),
                },
                _ => skip(ctx, record, "malformed digest record"),
            },
            "jre" => match parse_runtime_window(&record.fields()[1..]) {
                Some(window) => {
                    if !catalog.set_runtime_window(window) {
                        skip(ctx, record, "runtime requirement already set");
                    }
                }
                None => skip(ctx, record, "malformed runtime requirement"),
            },
            "P" => match record.fields_n(2).as_slice() {
                [_, name] if !name.is_empty() => catalog.insert(ContentNode::directory(name)),
                _ => skip(ctx, record, "malformed directory record"),
            },
            "F" => match record.fields_n(4).as_slice() {
                [_, hex, len, name] if !name.is_empty() => {
                    let Ok(length) = len.trim().parse::<u64>() else {
                        skip(ctx, record, "invalid length");
                        return Flow::Continue;
                    };
                    match Digest::from_hex(algorithm, hex) {
                        Ok(digest) => catalog.insert(ContentNode::file(name, digest, length)),
                        Err(err) => skip(ctx, record, &err.to_string()),
                    }
                }
                _ => skip(ctx, record, "malformed file record"),
            },
            _ => skip(ctx, record, "unrecognized"),
        }
        Flow::Continue
    })?;

    if catalog.is_empty() {
        return Err(ProtocolError::EmptyCatalog {
            origin: ctx.origin.clone(),
        });
    }
    Ok(catalog)
}

fn parse_runtime_window(bounds: &[&str]) -> Option<VersionWindow<RuntimeVersion>> {
    let (min, max) = match bounds {
        [min] => (min, None),
        [min, max] if max.trim().is_empty() => (min, None),
        [min, max] => (min, Some(max)),
        _ => return None,
    };
    let min = RuntimeVersion::parse(min).ok()?;
    let max = match max {
        Some(max) => Some(RuntimeVersion::parse(max).ok()?),
        None => None,
    };
    VersionWindow::new(Some(min), max).ok()
}
