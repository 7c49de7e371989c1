use std::io::BufRead;

use super::{for_each_record, is_plain_file_name, skip, Flow, ParseContext, LAUNCHER_COMPONENT};
use crate::{Architecture, Digest, DigestAlgorithm, Platform, PlainVersion, ProtocolError};
use crate::{RuntimeRelease, RuntimeVersion, VersionWindow};

/// Parses the runtime pool catalog (`jre/jreCatalog.txt`).
///
/// `jre,<version>` opens a version block and `require,AppLauncher,...` sets
/// the launcher window for the runtime files declared after it. Files come in
/// two layouts: `F,<hex>,<len>,<platform>,<file>` (x64 implied) and
/// `F,<arch>,<platform>,<file>,<hex>,<len>`.
pub fn parse_runtime_catalog<R: BufRead>(
    reader: R,
    ctx: &ParseContext,
) -> Result<Vec<RuntimeRelease>, ProtocolError> {
    let mut releases = Vec::new();
    let mut algorithm = DigestAlgorithm::Md5;
    let mut version: Option<RuntimeVersion> = None;
    let mut launcher_window = VersionWindow::<PlainVersion>::unbounded();

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
            ["jre", label] => match RuntimeVersion::parse(label) {
                Ok(parsed) => {
                    version = Some(parsed);
                    launcher_window = VersionWindow::unbounded();
                }
                Err(err) => skip(ctx, record, &err.to_string()),
            },
            ["require", component, bounds @ ..] if *component == LAUNCHER_COMPONENT => {
                match parse_launcher_window(bounds) {
                    Some(window) => launcher_window = window,
                    None => skip(ctx, record, "malformed launcher requirement"),
                }
            }
            ["F", ..] => {
                let Some(current) = version.clone() else {
                    skip(ctx, record, "runtime file before any jre record");
                    return Flow::Continue;
                };
                match runtime_file(&fields, algorithm, current, &launcher_window) {
                    Some(release) => releases.push(release),
                    None => skip(ctx, record, "malformed runtime file record"),
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

fn runtime_file(
    fields: &[&str],
    algorithm: DigestAlgorithm,
    version: RuntimeVersion,
    launcher_window: &VersionWindow<PlainVersion>,
) -> Option<RuntimeRelease> {
    let (architecture, platform, file_name, hex, length) = match fields {
        [_, hex, len, platform, file] => (Architecture::X64, *platform, *file, *hex, *len),
        [_, arch, platform, file, hex, len] => {
            (Architecture::parse(arch)?, *platform, *file, *hex, *len)
        }
        _ => return None,
    };
    let file_name = file_name.trim();
    if !is_plain_file_name(file_name) {
        return None;
    }
    Some(RuntimeRelease {
        version,
        architecture,
        platform: Platform::parse(platform)?,
        file_name: file_name.to_string(),
        digest: Digest::from_hex(algorithm, hex).ok()?,
        length: length.trim().parse().ok()?,
        launcher_window: launcher_window.clone(),
    })
}

fn parse_launcher_window(bounds: &[&str]) -> Option<VersionWindow<PlainVersion>> {
    let (min, max) = match bounds {
        [min] => (*min, None),
        [min, max] if max.trim().is_empty() => (*min, None),
        [min, max] => (*min, Some(*max)),
        _ => return None,
    };
    let min = PlainVersion::parse(min).ok()?;
    let max = match max {
        Some(max) => Some(PlainVersion::parse(max).ok()?),
        None => None,
    };
    VersionWindow::new(Some(min), max).ok()
}
