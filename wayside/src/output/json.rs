use failure::Error;
use super::history::{self, LogEvent};

use std::io;

fn escape(s :&str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

pub fn javascript_history<W: io::Write>(history :&history::History, f :&mut W) -> Result<(), Error> {
    write!(f, "var data = ")?;
    json_history(history, f)?;
    write!(f, ";")?;
    Ok(())
}

/// Writes every cycle of a replay: the blocks it changed and its log lines.
pub fn json_history<W: io::Write>(history :&history::History, f :&mut W) -> Result<(), Error> {
    write!(f, "{{ \"line\": \"{}\", \"cycles\": [", escape(&history.line))?;
    let mut first = true;
    for (t, report) in &history.cycles {
        if first { first = false; } else { write!(f, ", ")?; }
        write!(f, "\n  {{ \"time\": {}, \"cycle\": {}, \"changes\": [", t, report.cycle)?;

        let mut first_change = true;
        for c in &report.changes {
            if first_change { first_change = false; } else { write!(f, ", ")?; }
            write!(f, "{{ \"block\": {}, \"authority\": {}, \"speed\": {}, \"source\": \"{}\" }}",
                   c.block, c.after.authority, c.after.speed, c.after.source)?;
        }
        write!(f, "], \"events\": [")?;

        let mut first_event = true;
        for ev in report.events.iter().filter(|e| match e {
            LogEvent::AuthorityChanged { .. } => false,
            _ => true,
        }) {
            if first_event { first_event = false; } else { write!(f, ", ")?; }
            write!(f, "\"{}\"", escape(&ev.to_string()))?;
        }
        write!(f, "] }}")?;
    }
    write!(f, "\n] }}\n")?;
    Ok(())
}
