use std::io::BufRead;

use super::{for_each_record, skip, Flow, ParseContext};
use crate::{AppRelease, ProtocolError};

/// Parses `<app>/appCatalog.txt` into the published releases, in file order.
pub fn parse_app_catalog<R: BufRead>(
    reader: R,
    app_name: &str,
    ctx: &ParseContext,
) -> Result<Vec<AppRelease>, ProtocolError> {
    let mut releases = Vec::new();
    let mut open: Option<AppRelease> = None;

    for_each_record(reader, ctx, |record| {
        let fields = record.fields();
        match fields.as_slice() {
            ["name", _] => {}
            ["exit", ..] => {
                if ctx.should_exit(&fields) {
                    return Flow::Stop;
                }
            }
            ["R", label, stamp] => match AppRelease::parse_build_time(stamp) {
                Some(build_time) => {
                    releases.extend(open.take());
                    open = Some(AppRelease::new(app_name, label.trim(), build_time));
                }
                None => skip(ctx, record, "unparsable build time"),
            },
            ["info", "msg", ..] => {
                let text = record.fields_n(3).get(2).copied().unwrap_or_default();
                match open.as_mut() {
                    Some(release) => release.append_info(text),
                    None => skip(ctx, record, "info without an open release"),
                }
            }
            _ => skip(ctx, record, "unrecognized"),
        }
        Flow::Continue
    })?;

    releases.extend(open);
    if releases.is_empty() {
        return Err(ProtocolError::EmptyCatalog {
            origin: ctx.origin.clone(),
        });
    }
    Ok(releases)
}
