use anstyle::{AnsiColor, Style};
use env_logger::{Builder, Env, WriteStyle};
use log::kv::Key;
use std::io::Write;

const DURATION_WIDTH: usize = 10;

/// Extract the `duration` key-value and format it to 2 decimal places.
fn format_duration(record: &log::Record<'_>) -> String {
    record
        .key_values()
        .get(Key::from("duration"))
        .map(|v| {
            let s = format!("{}", v);
            if let Some(idx) = s.find(|c: char| c.is_alphabetic()) {
                let (num, unit) = (&s[..idx], &s[idx..]);
                if let Ok(val) = num.parse::<f32>() {
                    return format!("{:.2} {}", val, unit);
                }
            }
            s
        })
        .unwrap_or_default()
}

/// Install the global logger. `RUST_LOG` overrides the default filters.
pub fn initialize_logger() {
    let dim = Style::new().fg_color(Some(AnsiColor::BrightBlack.into()));
    let cyan = Style::new().fg_color(Some(AnsiColor::Cyan.into()));

    let result = Builder::new()
        .write_style(WriteStyle::Auto)
        .format(move |buf, record| {
            let level_style = buf.default_level_style(record.level());

            let dur_raw = format_duration(record);
            let dur = if dur_raw.is_empty() {
                " ".repeat(DURATION_WIDTH)
            } else {
                format!("{cyan}{:>width$}{cyan:#}", dur_raw, width = DURATION_WIDTH)
            };

            writeln!(
                buf,
                "{dim}{}{dim:#} {level_style}{}{level_style:#} {dim}{}{dim:#}",
                buf.timestamp(),
                record.level(),
                record.target()
            )?;

            let message = format!("{}", record.args());
            let subsequent_indent = " ".repeat(DURATION_WIDTH + 1);
            let mut lines = message.lines();

            if let Some(first_line) = lines.next() {
                writeln!(buf, "{} {}", dur, first_line)?;
            }
            for line in lines {
                writeln!(buf, "{}{}", subsequent_indent, line)?;
            }

            Ok(())
        })
        // Only show INFO+ globally, WARN+ for Rocket
        .filter(None, log::LevelFilter::Info)
        .filter(Some("rocket"), log::LevelFilter::Warn)
        .filter(Some("_"), log::LevelFilter::Warn)
        .parse_env(Env::default())
        .try_init();

    if let Err(err) = result {
        eprintln!("Logger already initialized: {}", err);
    }
}
