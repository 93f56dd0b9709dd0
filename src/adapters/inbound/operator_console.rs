use crate::application::WaypointFollowingService;
use crate::common::{ApplicationResult, DomainError, DomainResult};
use crate::domains::waypoint_following::{Pose, WaypointSpec};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const HELP: &str = "commands: pause | resume | cancel | add <x> <y> [yaw] | goto <x> <y> [yaw] | start <file> | save <file> | status | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    Pause,
    Resume,
    Cancel,
    /// Append to the back of the route.
    Add(WaypointSpec),
    /// Insert at the front, to be pursued next.
    Goto(WaypointSpec),
    Start(PathBuf),
    Save(PathBuf),
    Status,
    Help,
    Quit,
}

/// Parses one console line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_command(line: &str) -> DomainResult<Option<OperatorCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let command = match (verb.as_str(), args.as_slice()) {
        ("pause", []) => OperatorCommand::Pause,
        ("resume", []) => OperatorCommand::Resume,
        ("cancel", []) | ("reset", []) => OperatorCommand::Cancel,
        ("status", []) => OperatorCommand::Status,
        ("help", []) | ("?", []) => OperatorCommand::Help,
        ("quit", []) | ("exit", []) => OperatorCommand::Quit,
        ("add", coords) => OperatorCommand::Add(parse_waypoint(coords)?),
        ("goto", coords) => OperatorCommand::Goto(parse_waypoint(coords)?),
        ("start", [path]) => OperatorCommand::Start(PathBuf::from(path)),
        ("save", [path]) => OperatorCommand::Save(PathBuf::from(path)),
        (verb, _) => return Err(invalid(format!("cannot parse '{}' ({})", verb, HELP))),
    };
    Ok(Some(command))
}

fn parse_waypoint(args: &[&str]) -> DomainResult<WaypointSpec> {
    let numbers = args
        .iter()
        .map(|a| a.parse::<f64>().map_err(|_| invalid(format!("'{}' is not a number", a))))
        .collect::<DomainResult<Vec<f64>>>()?;
    match numbers.as_slice() {
        [x, y] => Ok(WaypointSpec::new(Pose::from_point(*x, *y, 0.0))),
        [x, y, yaw] => Ok(WaypointSpec::new(Pose::from_xy_yaw(*x, *y, *yaw))),
        _ => Err(invalid("expected <x> <y> [yaw]")),
    }
}

fn invalid(reason: impl Into<String>) -> DomainError {
    DomainError::InvalidCommand {
        reason: reason.into(),
    }
}

/// Drives the follower from text commands, one per line.
pub struct OperatorConsole {
    service: Arc<WaypointFollowingService>,
}

impl OperatorConsole {
    pub fn new(service: Arc<WaypointFollowingService>) -> Self {
        Self { service }
    }

    /// Runs one command and returns the line to show the operator.
    pub async fn execute(&self, command: OperatorCommand) -> ApplicationResult<String> {
        let surface = self.service.surface();
        let reply = match command {
            OperatorCommand::Pause => {
                surface.pause().await?;
                "pausing".to_string()
            }
            OperatorCommand::Resume => {
                surface.resume().await?;
                "resuming".to_string()
            }
            OperatorCommand::Cancel => {
                surface.cancel().await?;
                "cancelling".to_string()
            }
            OperatorCommand::Add(spec) => {
                let waypoint = surface.insert_waypoint(spec, false).await?;
                format!("queued waypoint #{}", waypoint.index)
            }
            OperatorCommand::Goto(spec) => {
                let waypoint = surface.insert_waypoint(spec, true).await?;
                format!("waypoint #{} goes next", waypoint.index)
            }
            OperatorCommand::Start(path) => {
                let accepted = self.service.start_from_file(&path).await?;
                format!("following {} waypoint(s) from {}", accepted, path.display())
            }
            OperatorCommand::Save(path) => {
                let saved = self.service.save_remaining(&path)?;
                format!("saved {} waypoint(s) to {}", saved, path.display())
            }
            OperatorCommand::Status => surface.status().summary(),
            OperatorCommand::Help => HELP.to_string(),
            OperatorCommand::Quit => "bye".to_string(),
        };
        Ok(reply)
    }

    /// Reads commands until EOF or `quit`. Bad lines and failed commands are
    /// reported to `output` and do not stop the loop.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let reply = match parse_command(&line) {
                Ok(None) => continue,
                Ok(Some(OperatorCommand::Quit)) => break,
                Ok(Some(command)) => match self.execute(command).await {
                    Ok(reply) => reply,
                    Err(e) => format!("error: {}", e),
                },
                Err(e) => format!("error: {}", e),
            };
            output.write_all(reply.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_verb() {
        assert_eq!(parse_command("pause").unwrap(), Some(OperatorCommand::Pause));
        assert_eq!(parse_command("  RESUME ").unwrap(), Some(OperatorCommand::Resume));
        assert_eq!(parse_command("reset").unwrap(), Some(OperatorCommand::Cancel));
        assert_eq!(
            parse_command("start route.toml").unwrap(),
            Some(OperatorCommand::Start(PathBuf::from("route.toml")))
        );
        assert_eq!(parse_command("# note").unwrap(), None);
        assert_eq!(parse_command("").unwrap(), None);
    }

    #[test]
    fn add_and_goto_take_optional_yaw() {
        match parse_command("add 1 2").unwrap() {
            Some(OperatorCommand::Add(spec)) => {
                assert_eq!(spec.pose, Pose::from_point(1.0, 2.0, 0.0));
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse_command("goto 3 4 1.0").unwrap() {
            Some(OperatorCommand::Goto(spec)) => {
                assert!((spec.pose.orientation.yaw() - 1.0).abs() < 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("add 1").is_err());
        assert!(parse_command("add one two").is_err());
        assert!(matches!(
            parse_command("fly"),
            Err(DomainError::InvalidCommand { .. })
        ));
        assert!(parse_command("pause now").is_err());
    }
}
