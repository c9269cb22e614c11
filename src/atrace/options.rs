//! Translation of capture options into `atrace` invocation arguments.

/// Builder for configuring the arguments passed to `adb shell atrace`.
#[derive(Debug, Clone)]
pub struct AtraceOptions {
    disk: bool,
    cpu_freq: bool,
    cpu_idle: bool,
    cpu_load: bool,
    cpu_sched: bool,
    workqueue: bool,
    time_secs: Option<u32>,
    buffer_kb: Option<u32>,
}

impl Default for AtraceOptions {
    fn default() -> Self {
        Self {
            disk: false,
            cpu_freq: false,
            cpu_idle: false,
            cpu_load: false,
            cpu_sched: true,
            workqueue: false,
            time_secs: None,
            buffer_kb: None,
        }
    }
}

impl AtraceOptions {
    /// Create options with scheduler tracing enabled and everything else off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trace disk I/O (requires root on the device).
    #[must_use]
    pub fn disk(mut self, enabled: bool) -> Self {
        self.disk = enabled;
        self
    }

    /// Trace CPU frequency changes.
    #[must_use]
    pub fn cpu_freq(mut self, enabled: bool) -> Self {
        self.cpu_freq = enabled;
        self
    }

    /// Trace CPU idle events.
    #[must_use]
    pub fn cpu_idle(mut self, enabled: bool) -> Self {
        self.cpu_idle = enabled;
        self
    }

    /// Trace CPU load.
    #[must_use]
    pub fn cpu_load(mut self, enabled: bool) -> Self {
        self.cpu_load = enabled;
        self
    }

    /// Trace the CPU scheduler. On by default; turning it off lowers the
    /// data rate into the kernel buffer and allows longer captures.
    #[must_use]
    pub fn cpu_sched(mut self, enabled: bool) -> Self {
        self.cpu_sched = enabled;
        self
    }

    /// Trace kernel workqueues (requires root on the device).
    #[must_use]
    pub fn workqueue(mut self, enabled: bool) -> Self {
        self.workqueue = enabled;
        self
    }

    /// Capture for the given number of seconds.
    #[must_use]
    pub fn time_secs(mut self, secs: u32) -> Self {
        self.time_secs = Some(secs);
        self
    }

    /// Use a kernel trace buffer of the given size in KB.
    #[must_use]
    pub fn buffer_kb(mut self, kb: u32) -> Self {
        self.buffer_kb = Some(kb);
        self
    }

    /// Build the `adb` command-line arguments.
    ///
    /// `-z` is always passed so the payload after the marker line is
    /// zlib-compressed.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["shell".to_string(), "atrace".to_string(), "-z".to_string()];

        let flags = [
            (self.disk, "-d"),
            (self.cpu_freq, "-f"),
            (self.cpu_idle, "-i"),
            (self.cpu_load, "-l"),
            (self.cpu_sched, "-s"),
            (self.workqueue, "-w"),
        ];
        args.extend(
            flags
                .iter()
                .filter(|(enabled, _)| *enabled)
                .map(|(_, flag)| (*flag).to_string()),
        );

        if let Some(secs) = self.time_secs {
            args.push("-t".to_string());
            args.push(secs.to_string());
        }

        if let Some(kb) = self.buffer_kb {
            args.push("-b".to_string());
            args.push(kb.to_string());
        }

        args
    }
}
