use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::SolverError;

/// Turns a decoded challenge image into the guessed text.
pub trait ImageSolver: Send + Sync {
    fn solve(&self, image: &[u8]) -> Result<String, SolverError>;
}

impl<F> ImageSolver for F
where
    F: Fn(&[u8]) -> Result<String, SolverError> + Send + Sync,
{
    fn solve(&self, image: &[u8]) -> Result<String, SolverError> {
        self(image)
    }
}

/// Runs an external OCR program: image bytes on stdin, text on stdout.
#[derive(Debug, Clone)]
pub struct CommandSolver {
    program: String,
    args: Vec<String>,
}

impl CommandSolver {
    pub fn new(command: &[String]) -> Result<Self, SolverError> {
        let (program, args) = command.split_first().ok_or(SolverError::NoCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl ImageSolver for CommandSolver {
    fn solve(&self, image: &[u8]) -> Result<String, SolverError> {
        let spawn_err = |source| SolverError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(image).map_err(spawn_err)?;
        }
        let output = child.wait_with_output().map_err(spawn_err)?;

        if !output.status.success() {
            return Err(SolverError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text: String = String::from_utf8_lossy(&output.stdout)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if text.is_empty() {
            return Err(SolverError::Empty);
        }
        if text.chars().count() != 6 {
            tracing::debug!(text = %text, "OCR guess is not six characters");
        }
        Ok(text)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> CommandSolver {
        let parts: Vec<String> = parts.iter().map(|s| s.to_string()).collect();
        CommandSolver::new(&parts).unwrap()
    }

    #[test]
    fn reads_trimmed_stdout() {
        let solver = command(&["cat"]);
        assert_eq!(solver.solve(b" ab12cd\n").unwrap(), "ab12cd");
    }

    #[test]
    fn failing_command_is_reported() {
        let solver = command(&["sh", "-c", "cat >/dev/null; echo boom >&2; exit 3"]);
        assert!(matches!(solver.solve(b"x"), Err(SolverError::Failed { ref stderr, .. }) if stderr == "boom"));
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(CommandSolver::new(&[]), Err(SolverError::NoCommand)));
    }
}
