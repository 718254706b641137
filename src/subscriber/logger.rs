use tracing::Level;

use crate::uri::CrawlUri;

/// Logger handed to subscribers
///
/// Every event carries `source = <subscriber name>`, events about a URI also
/// carry `crawl_uri`.
#[derive(Debug, Clone)]
pub struct SubscriberLogger {
    source: String,
}

macro_rules! emit {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN => tracing::warn!($($field)*),
            Level::INFO => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            _ => tracing::trace!($($field)*),
        }
    };
}

impl SubscriberLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn log(&self, level: Level, message: &str) {
        emit!(level, source = %self.source, "{message}");
    }

    pub fn log_with_crawl_uri(&self, crawl_uri: &CrawlUri, level: Level, message: &str) {
        emit!(level, source = %self.source, crawl_uri = %crawl_uri, "{message}");
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use url::Url;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_events_carry_source() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let logger = SubscriberLogger::new("LinkCollector");
        let crawl_uri = CrawlUri::base(Url::parse("https://a.test/").unwrap());

        tracing::subscriber::with_default(subscriber, || {
            logger.info("plain message");
            logger.log_with_crawl_uri(&crawl_uri, Level::DEBUG, "about a uri");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("plain message"));
        assert!(output.contains("source=LinkCollector"));
        assert!(output.contains("about a uri"));
        assert!(output.contains("crawl_uri=URI: https://a.test/"));
    }
}
