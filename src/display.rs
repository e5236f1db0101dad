use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::error::{Error, Result};

/// Rotation accepted by displayplacer's `degree:` token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = Error;

    fn try_from(degrees: u16) -> Result<Self> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(Error::InvalidConfig(format!("unsupported rotation {}", other))),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(r: Rotation) -> u16 {
        r.degrees()
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// One physical output as reported by displayplacer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Display {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
    pub rotation: Rotation,
    pub enabled: bool,
}

impl Display {
    pub fn new(id: &str, (width, height): (u32, u32), (x, y): (i32, i32)) -> Result<Self> {
        let display = Display {
            id: id.to_string(),
            width,
            height,
            x,
            y,
            rotation: Rotation::Deg0,
            enabled: true,
        };
        display.validate()?;
        Ok(display)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() || self.id.chars().any(char::is_whitespace) {
            return Err(Error::InvalidConfig(format!("bad display id {:?}", self.id)));
        }
        // displayplacer reports a switched-off display without a resolution.
        let unknown_size = self.width == 0 && self.height == 0 && !self.enabled;
        if (self.width == 0 || self.height == 0) && !unknown_size {
            return Err(Error::InvalidConfig(format!(
                "display {} has empty resolution {}x{}",
                self.id, self.width, self.height
            )));
        }
        Ok(())
    }

    /// False for a disabled display whose resolution the tool did not report.
    pub fn has_geometry(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn resolution_string(&self) -> String {
        if self.enabled {
            format!("{}x{}", self.width, self.height)
        } else {
            "Disabled".to_string()
        }
    }
}

/// The whole arrangement reported by one `list()` call.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct DeviceSet {
    displays: Vec<Display>,
    /// Raw tool output that produced this set, kept for debugging.
    raw: String,
}

impl DeviceSet {
    pub fn new(displays: Vec<Display>, raw: impl Into<String>) -> Result<Self> {
        let mut seen = HashSet::new();
        for d in &displays {
            d.validate()?;
            if !seen.insert(d.id.as_str()) {
                return Err(Error::InvalidConfig(format!("duplicate display id {}", d.id)));
            }
        }
        Ok(DeviceSet { displays, raw: raw.into() })
    }

    pub fn displays(&self) -> &[Display] {
        &self.displays
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }

    pub fn len(&self) -> usize {
        self.displays.len()
    }

    pub fn get(&self, id: &str) -> Option<&Display> {
        self.displays.iter().find(|d| d.id == id)
    }

    /// Mutable access is only meant for the speculative drag position; the
    /// next `list()` overwrites whatever is written here.
    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Display> {
        self.displays.iter_mut().find(|d| d.id == id)
    }

    pub fn enabled_count(&self) -> usize {
        self.displays.iter().filter(|d| d.enabled).count()
    }
}

const EXECUTE_MARKER: &str = "Execute the command below";

/// Parse the output of `displayplacer list`.
///
/// Only the command printed after the "Execute the command below" marker is
/// read; the usage examples earlier in the output also contain `id:` tokens.
pub fn parse_list_output(tool: &str, output: &str) -> Result<DeviceSet> {
    let mut displays = Vec::new();
    let mut after_marker = false;

    for line in output.lines() {
        if line.contains(EXECUTE_MARKER) {
            after_marker = true;
            continue;
        }
        let line = line.trim();
        if !after_marker || !line.starts_with(tool) || !line.contains("id:") || !line.contains("origin:") {
            continue;
        }
        // Quoted tokens sit at odd indices once split on '"'.
        for token in line.split('"').skip(1).step_by(2) {
            match parse_display_token(token) {
                Some(d) => displays.push(d),
                None => warn!(token, "Skipping unparseable display token"),
            }
        }
    }

    if displays.is_empty() {
        return Err(Error::InvalidConfig(format!("no displays found in {} output", tool)));
    }
    DeviceSet::new(displays, output)
}

/// Parse one quoted token: "id:<id> res:<w>x<h> origin:(<x>,<y>) degree:<r>".
fn parse_display_token(token: &str) -> Option<Display> {
    let mut id = None;
    let mut resolution = None;
    let mut origin = None;
    let mut rotation = Rotation::Deg0;
    let mut enabled = true;

    for part in token.split_whitespace() {
        if let Some(v) = part.strip_prefix("id:") {
            id = Some(v.to_string());
        } else if let Some(v) = part.strip_prefix("res:") {
            resolution = Some(parse_resolution(v)?);
        } else if let Some(v) = part.strip_prefix("origin:") {
            origin = Some(parse_coordinates(v)?);
        } else if let Some(v) = part.strip_prefix("degree:") {
            rotation = Rotation::try_from(v.parse::<u16>().ok()?).ok()?;
        } else if let Some(v) = part.strip_prefix("enabled:") {
            enabled = v != "false";
        } else if part == "disabled" {
            enabled = false;
        }
    }

    let id = id.filter(|s| !s.is_empty())?;
    let (width, height) = match resolution {
        Some(res) => res,
        None if !enabled => (0, 0),
        None => return None,
    };
    let (x, y) = origin.unwrap_or((0, 0));
    let display = Display { id, width, height, x, y, rotation, enabled };
    display.validate().ok()?;
    Some(display)
}

fn parse_resolution(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// "(x,y)" with either coordinate possibly negative.
fn parse_coordinates(s: &str) -> Option<(i32, i32)> {
    let inner = s.strip_prefix('(')?.strip_suffix(')')?;
    let (x, y) = inner.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_OUTPUT: &str = r#"Persistent screen id: 37D8832A-2D66-02CA-B9F7-8F30A301B230
Contextual screen id: 1
Type: MacBook built in screen
Resolution: 1512x982

Execute the command below to set your screens to the current arrangement:

displayplacer "id:37D8832A-2D66-02CA-B9F7-8F30A301B230 res:1512x982 hz:120 color_depth:8 enabled:true scaling:on origin:(0,0) degree:0" "id:A1B2 res:2560x1440 hz:60 color_depth:8 enabled:true scaling:off origin:(-2560,-200) degree:90"
"#;

    #[test]
    fn test_parse_coordinates() {
        assert_eq!(parse_coordinates("(0,0)"), Some((0, 0)));
        assert_eq!(parse_coordinates("(2560,0)"), Some((2560, 0)));
        assert_eq!(parse_coordinates("(-1920,0)"), Some((-1920, 0)));
        assert_eq!(parse_coordinates("0,0"), None);
        assert_eq!(parse_coordinates("(1,2,3)"), None);
    }

    #[test]
    fn test_parse_list_output() {
        let set = parse_list_output("displayplacer", LIST_OUTPUT).unwrap();
        assert_eq!(set.len(), 2);

        let builtin = set.get("37D8832A-2D66-02CA-B9F7-8F30A301B230").unwrap();
        assert_eq!((builtin.width, builtin.height), (1512, 982));
        assert_eq!((builtin.x, builtin.y), (0, 0));
        assert!(builtin.enabled);

        let external = set.get("A1B2").unwrap();
        assert_eq!((external.x, external.y), (-2560, -200));
        assert_eq!(external.rotation, Rotation::Deg90);
        assert_eq!(set.raw(), LIST_OUTPUT);
    }

    #[test]
    fn test_examples_before_marker_are_ignored() {
        let output = "displayplacer \"id:EXAMPLE res:800x600 origin:(0,0) degree:0\"\n";
        assert!(matches!(
            parse_list_output("displayplacer", output),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_disabled_token() {
        let d = parse_display_token("id:X res:1920x1080 enabled:false origin:(0,0) degree:0").unwrap();
        assert!(!d.enabled);
        let d = parse_display_token("id:X res:1920x1080 origin:(0,0) degree:0 disabled").unwrap();
        assert!(!d.enabled);
    }

    #[test]
    fn test_bad_tokens_are_skipped() {
        assert!(parse_display_token("res:1920x1080 origin:(0,0)").is_none());
        assert!(parse_display_token("id:X res:0x1080 origin:(0,0)").is_none());
        assert!(parse_display_token("id:X res:1920x1080 origin:(0,0) degree:45").is_none());
        // Only a switched-off display may come without a resolution.
        assert!(parse_display_token("id:X origin:(0,0) degree:0").is_none());
    }

    #[test]
    fn test_switched_off_display_without_resolution() {
        let output = "Execute the command below to set your screens to the current arrangement:\n\n\
            displayplacer \"id:A res:1920x1080 hz:60 color_depth:8 enabled:true scaling:off origin:(0,0) degree:0\" \"id:B enabled:false\"\n";
        let set = parse_list_output("displayplacer", output).unwrap();
        let ids: Vec<&str> = set.displays().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);

        let b = set.get("B").unwrap();
        assert!(!b.enabled);
        assert!(!b.has_geometry());
        assert_eq!(b.resolution_string(), "Disabled");
        assert_eq!(set.enabled_count(), 1);
    }

    #[test]
    fn test_device_set_rejects_duplicates() {
        let a = Display::new("1", (1920, 1080), (0, 0)).unwrap();
        let b = Display::new("1", (1280, 720), (1920, 0)).unwrap();
        assert!(DeviceSet::new(vec![a, b], "").is_err());
    }

    #[test]
    fn test_enabled_count() {
        let a = Display::new("1", (1920, 1080), (0, 0)).unwrap();
        let mut b = Display::new("2", (1280, 720), (1920, 0)).unwrap();
        b.enabled = false;
        let set = DeviceSet::new(vec![a, b], "").unwrap();
        assert_eq!(set.enabled_count(), 1);
    }

    #[test]
    fn test_rotation_serde() {
        let json = serde_json::to_string(&Rotation::Deg270).unwrap();
        assert_eq!(json, "270");
        assert!(serde_json::from_str::<Rotation>("45").is_err());
    }
}
