use std::io::BufRead;

use super::{for_each_record, is_plain_file_name, skip, Flow, ParseContext};
use crate::{Digest, DigestAlgorithm, LauncherRelease, PlainVersion, ProtocolError};

/// Parses the launcher pool catalog (`launcher/appCatalog.txt`), whose file
/// records carry the launcher version: `F,<hex>,<len>,<file>,<version>`.
pub fn parse_launcher_catalog<R: BufRead>(
    reader: R,
    ctx: &ParseContext,
) -> Result<Vec<LauncherRelease>, ProtocolError> {
    let mut releases = Vec::new();
    let mut algorithm = DigestAlgorithm::Md5;

    for_each_record(reader, ctx, |record| {
        let fields = record.fields();
        match fields.as_slice() {
            ["name", _] => {}
            ["exit", ..] => {
                if ctx.should_exit(&fields) {
                    return Flow::Stop;
                }
            }
            ["digest", name] => match DigestAlgorithm::parse(name) {
                Ok(parsed) => algorithm = parsed,
                Err(err) => skip(ctx, record, &err.to_string()),
            },
            ["F", hex, len, file, version] => {
                let parsed = (
                    Digest::from_hex(algorithm, hex),
                    len.trim().parse::<u64>(),
                    PlainVersion::parse(version),
                );
                match parsed {
                    (Ok(digest), Ok(length), Ok(version)) if is_plain_file_name(file.trim()) => {
                        releases.push(LauncherRelease {
                            version,
                            file_name: file.trim().to_string(),
                            digest,
                            length,
                        })
                    }
                    _ => skip(ctx, record, "malformed launcher file record"),
                }
            }
            _ => skip(ctx, record, "unrecognized"),
        }
        Flow::Continue
    })?;

    if releases.is_empty() {
        return Err(ProtocolError::EmptyCatalog {
            origin: ctx.origin.clone(),
        });
    }
    Ok(releases)
}
