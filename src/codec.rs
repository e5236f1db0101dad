//! Serialization of a display arrangement into a displayplacer command line.
//!
//! Presets keep this string verbatim and replay it; nothing in dpui parses a
//! preset back into displays.

use crate::display::Display;
use crate::error::{Error, Result};

pub const TOOL_NAME: &str = "displayplacer";

/// `displayplacer "id:<id> res:<w>x<h> origin:(<x>,<y>) degree:<r>" ...`
pub fn encode(displays: &[Display]) -> Result<String> {
    let mut out = String::from(TOOL_NAME);
    for d in displays {
        d.validate()?;
        out.push_str(" \"");
        out.push_str(&display_token(d));
        out.push('"');
    }
    Ok(out)
}

fn display_token(d: &Display) -> String {
    if !d.has_geometry() {
        return format!("id:{} enabled:false", d.id);
    }
    let mut token = format!(
        "id:{} res:{}x{} origin:({},{}) degree:{}",
        d.id,
        d.width,
        d.height,
        d.x,
        d.y,
        d.rotation.degrees()
    );
    if !d.enabled {
        token.push_str(" enabled:false");
    }
    token
}

/// Command that flips a single display on or off.
pub fn toggle_command(id: &str, enabled: bool) -> String {
    format!("{} \"id:{} enabled:{}\"", TOOL_NAME, id, enabled)
}

/// Split a configuration string into process arguments, dropping the
/// leading tool name when present.
pub fn to_args(config: &str, tool: &str) -> Result<Vec<String>> {
    let mut args = shlex::split(config)
        .ok_or_else(|| Error::InvalidConfig(format!("unbalanced quotes in {:?}", config)))?;
    if args.first().is_some_and(|a| a == tool || a == TOOL_NAME) {
        args.remove(0);
    }
    if args.is_empty() {
        return Err(Error::InvalidConfig("configuration has no display arguments".to_string()));
    }
    Ok(args)
}
