//! Delivery into the terminal for `relay ask`.
//!
//! The answer goes to stdout; the placeholder and traces go to stderr so the
//! answer can be piped on its own.

use std::{
    io::Write,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    async_trait::async_trait,
    relay_channels::{DeliveryAdapter, DeliveryHandle, Error, Result},
};

type Sink = Mutex<Box<dyn Write + Send>>;

pub struct TerminalDelivery {
    out: Sink,
    status: Sink,
    chunk_size: usize,
    next_id: AtomicU64,
}

impl TerminalDelivery {
    pub fn stdio(chunk_size: usize) -> Self {
        Self::new(
            Box::new(std::io::stdout()),
            Box::new(std::io::stderr()),
            chunk_size,
        )
    }

    pub fn new(out: Box<dyn Write + Send>, status: Box<dyn Write + Send>, chunk_size: usize) -> Self {
        Self {
            out: Mutex::new(out),
            status: Mutex::new(status),
            chunk_size: chunk_size.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    fn write_line(sink: &Sink, text: &str) -> Result<()> {
        let mut sink = sink.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(sink, "{text}")
            .and_then(|()| sink.flush())
            .map_err(|e| Error::external("terminal write", e))
    }
}

#[async_trait]
impl DeliveryAdapter for TerminalDelivery {
    async fn post_placeholder(&self, text: &str) -> Result<DeliveryHandle> {
        Self::write_line(&self.status, text)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(DeliveryHandle::new(id.to_string()))
    }

    async fn update_placeholder(&self, _handle: &DeliveryHandle, text: &str) -> Result<()> {
        Self::write_line(&self.out, text)
    }

    async fn delete_placeholder(&self, _handle: &DeliveryHandle) -> Result<()> {
        Ok(())
    }

    async fn post_follow_up(&self, text: &str) -> Result<()> {
        Self::write_line(&self.out, text)
    }

    async fn post_trace(&self, text: &str) -> Result<()> {
        Self::write_line(&self.status, text)
    }

    fn max_message_len(&self) -> usize {
        self.chunk_size
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::sync::Arc};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn answer_and_status_are_separated() {
        let out = Buffer::default();
        let status = Buffer::default();
        let delivery = TerminalDelivery::new(Box::new(out.clone()), Box::new(status.clone()), 100);

        let handle = delivery.post_placeholder("🧠 Thinking...").await.unwrap();
        delivery.post_trace("🧠 *Thought* (root): hmm").await.unwrap();
        delivery.update_placeholder(&handle, "first").await.unwrap();
        delivery.post_follow_up("second").await.unwrap();

        assert_eq!(out.text(), "first\nsecond\n");
        assert_eq!(status.text(), "🧠 Thinking...\n🧠 *Thought* (root): hmm\n");
    }

    #[tokio::test]
    async fn handles_are_unique() {
        let delivery = TerminalDelivery::new(
            Box::new(Buffer::default()),
            Box::new(Buffer::default()),
            0,
        );
        let a = delivery.post_placeholder("a").await.unwrap();
        let b = delivery.post_placeholder("b").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(delivery.max_message_len(), 1);
    }
}
