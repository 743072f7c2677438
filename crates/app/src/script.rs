//! Line-oriented event scripts for `eyeglow replay`.
//!
//! One command per line; blank lines and `#` comments are skipped.

use std::path::PathBuf;

use eyeglow_core::{EyeglowError, Result, SceneEvent};

/// A parsed script line. File-backed steps are resolved when replayed.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Event(SceneEvent),
    UploadFile(PathBuf),
    ImportFile(PathBuf),
    /// Deletes the point currently being dragged.
    DeleteSelected,
    /// Deletes the point under the pointer at normalized coordinates.
    DeleteAt { x: f64, y: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub number: usize,
    pub step: Step,
}

pub fn parse_script(source: &str) -> Result<Vec<ScriptLine>> {
    let mut lines = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let number = index + 1;
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let step = parse_line(line)
            .map_err(|reason| EyeglowError::msg(format!("line {number}: {reason}")))?;
        lines.push(ScriptLine { number, step });
    }
    Ok(lines)
}

fn parse_line(line: &str) -> std::result::Result<Step, String> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let step = match (command, args.as_slice()) {
        ("upload", [path]) => Step::UploadFile(PathBuf::from(path)),
        ("import", [path]) => Step::ImportFile(PathBuf::from(path)),
        ("place", [x, y]) => Step::Event(SceneEvent::PlacePoint {
            x: number(x)?,
            y: number(y)?,
        }),
        ("select", [index]) => Step::Event(SceneEvent::SelectPoint(index_arg(index)?)),
        ("drag", [index, x, y]) => Step::Event(SceneEvent::DragPoint {
            index: index_arg(index)?,
            x: number(x)?,
            y: number(y)?,
        }),
        ("release", []) => Step::Event(SceneEvent::ReleasePoint),
        ("delete", []) => Step::DeleteSelected,
        ("delete", [index]) => Step::Event(SceneEvent::DeletePoint(index_arg(index)?)),
        ("delete-at", [x, y]) => Step::DeleteAt {
            x: number(x)?,
            y: number(y)?,
        },
        ("lock", []) => Step::Event(SceneEvent::ToggleLock),
        ("glow", [value]) => Step::Event(SceneEvent::SetGlowIntensity(number(value)?)),
        ("save", [slot]) => Step::Event(SceneEvent::SaveToSlot(slot_arg(slot)?)),
        ("load", [slot]) => Step::Event(SceneEvent::LoadFromSlot(slot_arg(slot)?)),
        ("export", []) => Step::Event(SceneEvent::ExportProfiles),
        (command, args) => {
            return Err(format!(
                "unrecognised command `{command}` with {} argument(s)",
                args.len()
            ))
        }
    };
    Ok(step)
}

fn number(raw: &str) -> std::result::Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("`{raw}` is not a number"))
}

fn index_arg(raw: &str) -> std::result::Result<usize, String> {
    raw.parse::<usize>()
        .map_err(|_| format!("`{raw}` is not a point index"))
}

fn slot_arg(raw: &str) -> std::result::Result<u8, String> {
    raw.parse::<u8>()
        .map_err(|_| format!("`{raw}` is not a slot number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_session() {
        let source = "\
# mark both eyes
upload portrait.png
place 0.35 0.42
place 0.65 0.42   # right eye

select 1
drag 1 0.66 0.43
release
lock
glow 0.8
save 1
";
        let lines = parse_script(source).unwrap();
        let numbers: Vec<usize> = lines.iter().map(|line| line.number).collect();
        assert_eq!(numbers, vec![2, 3, 4, 6, 7, 8, 9, 10, 11]);
        assert_eq!(lines[0].step, Step::UploadFile(PathBuf::from("portrait.png")));
        assert_eq!(
            lines[4].step,
            Step::Event(SceneEvent::DragPoint {
                index: 1,
                x: 0.66,
                y: 0.43
            })
        );
        assert_eq!(lines[8].step, Step::Event(SceneEvent::SaveToSlot(1)));
    }

    #[test]
    fn delete_forms() {
        let lines = parse_script("delete\ndelete 2\ndelete-at 0.5 0.5").unwrap();
        assert_eq!(lines[0].step, Step::DeleteSelected);
        assert_eq!(lines[1].step, Step::Event(SceneEvent::DeletePoint(2)));
        assert_eq!(lines[2].step, Step::DeleteAt { x: 0.5, y: 0.5 });
    }

    #[test]
    fn reports_line_of_bad_input() {
        let err = parse_script("place 0.1 0.2\nplace 0.1 up").unwrap_err();
        assert_eq!(err.to_string(), "line 2: `up` is not a number");

        let err = parse_script("spin 3").unwrap_err();
        assert!(err.to_string().starts_with("line 1: unrecognised command `spin`"));

        assert!(parse_script("save 300").is_err());
    }
}
