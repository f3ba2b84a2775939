use crate::collectors::Fault;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use tracing::debug;

/// Legacy "no valid reading" value for sinks that cannot express absence.
pub const NO_READING: i64 = -1;

/// Longest first line accepted from a source, terminator excluded.
pub const MAX_LINE_BYTES: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxReading {
    pub value: Option<i64>,
    pub faults: Vec<Fault>,
}

/// Reads the first line of `path` with the line terminator stripped and
/// nothing else removed. At most `MAX_LINE_BYTES` are consumed, so sources
/// that never end a line (`/dev/zero`) still return.
pub fn read_first_line(path: &str) -> Result<String, Fault> {
    let file = File::open(path).map_err(|err| Fault::io(path, &err))?;
    let mut reader = BufReader::new(file.take(MAX_LINE_BYTES + 1));
    let mut buf = Vec::new();
    reader
        .read_until(b'\n', &mut buf)
        .map_err(|err| Fault::io(path, &err))?;

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() as u64 > MAX_LINE_BYTES {
        buf.truncate(64);
        return Err(Fault::Parse {
            path: path.to_string(),
            raw: String::from_utf8_lossy(&buf).into_owned(),
        });
    }

    String::from_utf8(buf).map_err(|err| Fault::Parse {
        path: path.to_string(),
        raw: String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

pub fn read_scalar(path: &str) -> Result<i64, Fault> {
    let line = read_first_line(path)?;
    line.parse::<i64>().map_err(|_| Fault::Parse {
        path: path.to_string(),
        raw: line,
    })
}

/// Best-of-N over redundant sensors. Unreadable sensors contribute a fault
/// and never stop the remaining ones from being read.
pub fn max_of<S: AsRef<str>>(paths: &[S]) -> MaxReading {
    let mut value: Option<i64> = None;
    let mut faults = Vec::new();

    for path in paths {
        match read_scalar(path.as_ref()) {
            Ok(v) => {
                if value.map_or(true, |current| current < v) {
                    value = Some(v);
                }
            }
            Err(fault) => {
                debug!(path = %path.as_ref(), error = %fault, "sensor read failed");
                faults.push(fault);
            }
        }
    }

    MaxReading { value, faults }
}
