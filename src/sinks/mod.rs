pub mod http;
pub mod shepherd;
pub mod stdout;

use anyhow::Result;
use std::time::Duration;

use crate::core::config::{Settings, SinkKind};
use crate::core::display::{DisplaySink, LabelFormat};

/// Builds the display sink selected in `settings`.
pub fn from_settings(settings: &Settings) -> Result<Box<dyn DisplaySink>> {
    let id = settings.pair.indicator_id();
    let timeout = Duration::from_secs(settings.sink.timeout_secs);

    let sink: Box<dyn DisplaySink> = match settings.sink.kind {
        SinkKind::Stdout => Box::new(stdout::StdoutSink::stdout(timeout)),
        SinkKind::Http => Box::new(http::HttpSink::localhost(settings.sink.port, &id, timeout)?),
        SinkKind::Shepherd => {
            let guide = LabelFormat::new(&settings.pair, settings.decimals).guide();
            Box::new(shepherd::ShepherdSink::new(
                &format!("127.0.0.1:{}", settings.sink.port),
                &id,
                settings.sink.icon.clone(),
                guide,
                timeout,
            ))
        }
    };
    Ok(sink)
}
