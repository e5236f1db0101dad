use std::process::{Command, Output};
use tracing::{debug, info};

use crate::codec;
use crate::display::{self, DeviceSet};
use crate::error::{FailureClassifier, Result, TextClassifier};

/// What dpui needs from the display configuration tool.
pub trait DisplayService {
    fn list(&mut self) -> Result<DeviceSet>;
    fn apply(&mut self, config: &str) -> Result<()>;
}

/// Runs the real `displayplacer` binary.
pub struct DisplayPlacer {
    program: String,
    classifier: Box<dyn FailureClassifier>,
}

impl DisplayPlacer {
    pub fn new(program: impl Into<String>) -> Self {
        DisplayPlacer {
            program: program.into(),
            classifier: Box::new(TextClassifier),
        }
    }

    fn run(&self, args: &[String]) -> Result<Output> {
        debug!(program = %self.program, ?args, "Running display tool");
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| self.classifier.classify_spawn(&self.program, &e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).into_owned()
            } else {
                stderr.into_owned()
            };
            return Err(self.classifier.classify_output(&message));
        }
        Ok(output)
    }
}

impl DisplayService for DisplayPlacer {
    fn list(&mut self) -> Result<DeviceSet> {
        let output = self.run(&["list".to_string()])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        // The listing always names the tool "displayplacer", even when it is
        // invoked through a path or wrapper.
        display::parse_list_output(codec::TOOL_NAME, &stdout)
    }

    fn apply(&mut self, config: &str) -> Result<()> {
        let args = codec::to_args(config, &self.program)?;
        self.run(&args)?;
        info!(config, "Display configuration applied");
        Ok(())
    }
}
