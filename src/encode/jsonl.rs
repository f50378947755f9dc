use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::analysis::features::FeatureBundle;
use crate::analysis::session::FeatureSink;

/// One JSON object per tick. After a failed write the output may end in a
/// partial line, so the writer refuses everything that follows.
pub struct FeatureWriter<W: Write> {
    out: W,
    written: u64,
    failed: bool,
    line: Vec<u8>,
}

impl FeatureWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create features file: {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> FeatureWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            written: 0,
            failed: false,
            line: Vec::new(),
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(mut self) -> Result<W> {
        if self.failed {
            anyhow::bail!("Features output is incomplete after a failed write");
        }
        self.out.flush().context("Failed to flush features")?;
        Ok(self.out)
    }
}

impl<W: Write> FeatureSink for FeatureWriter<W> {
    fn present(&mut self, bundle: &FeatureBundle) -> Result<()> {
        if self.failed {
            anyhow::bail!("Features output is unusable after a failed write");
        }
        self.line.clear();
        serde_json::to_writer(&mut self.line, bundle).context("Failed to serialize features")?;
        self.line.push(b'\n');
        if let Err(err) = self.out.write_all(&self.line) {
            self.failed = true;
            return Err(err).context("Failed to write features");
        }
        self.written += 1;
        Ok(())
    }
}

/// Fans one bundle out to several sinks; every sink sees every tick even if
/// an earlier one fails.
#[derive(Default)]
pub struct Tee<'a> {
    sinks: Vec<&'a mut dyn FeatureSink>,
}

impl<'a> Tee<'a> {
    pub fn push(&mut self, sink: &'a mut dyn FeatureSink) {
        self.sinks.push(sink);
    }
}

impl FeatureSink for Tee<'_> {
    fn present(&mut self, bundle: &FeatureBundle) -> Result<()> {
        let mut first_err = None;
        for sink in self.sinks.iter_mut() {
            if let Err(err) = sink.present(bundle) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
