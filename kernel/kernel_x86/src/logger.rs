/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

use core::{
    fmt,
    fmt::Write,
    sync::atomic::{AtomicU64, Ordering},
};
use hal_x86::hw::serial::{SerialPort, COM1};
use spinning_top::Spinlock;
use tracing::{
    dispatcher::{self, Dispatch},
    span,
    Event,
    Level,
    Metadata,
    Subscriber,
};

static LOGGER: Logger = Logger::new();

pub fn init() {
    LOGGER.serial.lock().init();
    if dispatcher::set_global_default(Dispatch::from_static(&LOGGER)).is_err() {
        panic!("Failed to set default tracing dispatch");
    }
}

struct SerialWriter {
    serial: SerialPort,
}

impl SerialWriter {
    const fn new() -> SerialWriter {
        SerialWriter { serial: unsafe { SerialPort::new(COM1) } }
    }

    fn init(&mut self) {
        unsafe {
            self.serial.initialize();
        }
    }
}

impl fmt::Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            unsafe {
                self.serial.write(byte);
            }
        }

        Ok(())
    }
}

struct Logger {
    next_id: AtomicU64,
    serial: Spinlock<SerialWriter>,
}

impl Logger {
    const fn new() -> Logger {
        Logger { next_id: AtomicU64::new(1), serial: Spinlock::new(SerialWriter::new()) }
    }
}

impl Subscriber for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // The timer fires twenty times a second, so per-tick tracing would drown everything else out
        *metadata.level() <= Level::DEBUG
    }

    fn new_span(&self, _span: &span::Attributes) -> span::Id {
        let id = self.next_id.fetch_add(1, Ordering::Acquire);
        span::Id::from_u64(id)
    }

    fn record(&self, _span: &span::Id, _values: &span::Record) {}

    fn record_follows_from(&self, _span: &span::Id, _follows: &span::Id) {}

    fn event(&self, event: &Event) {
        use core::ops::DerefMut;

        if self.enabled(event.metadata()) {
            let level = event.metadata().level();
            let color = match *level {
                Level::TRACE => "\x1b[36m",
                Level::DEBUG => "\x1b[34m",
                Level::INFO => "\x1b[32m",
                Level::WARN => "\x1b[33m",
                Level::ERROR => "\x1b[31m",
            };
            let mut serial = self.serial.lock();
            let _ = write!(serial, "[{}{:5}\x1b[0m] {}: ", color, level, event.metadata().target());
            event.record(&mut Visitor::new(serial.deref_mut()));
            let _ = write!(serial, "\n");
        }
    }

    fn enter(&self, _span: &span::Id) {}

    fn exit(&self, _span: &span::Id) {}
}

struct Visitor<'w, W>
where
    W: Write,
{
    writer: &'w mut W,
}

impl<'w, W> Visitor<'w, W>
where
    W: Write,
{
    fn new(writer: &'w mut W) -> Visitor<'w, W> {
        Visitor { writer }
    }
}

impl<'w, W> tracing::field::Visit for Visitor<'w, W>
where
    W: Write,
{
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        // Handle the `message` field explicitly to declutter the output
        let _ = if field.name() == "message" {
            write!(self.writer, "{:?}", value)
        } else {
            write!(self.writer, " {}={:?}", field, value)
        };
    }
}

#[panic_handler]
pub fn panic(info: &core::panic::PanicInfo) -> ! {
    /*
     * If we panicked while logging, the serial lock is already held. Steal it rather than deadlocking, as
     * we're never coming back anyway.
     */
    unsafe {
        LOGGER.serial.force_unlock();
    }

    if let Some(location) = info.location() {
        let _ = writeln!(
            LOGGER.serial.lock(),
            "PANIC: {} ({} - {}:{})",
            info.message(),
            location.file(),
            location.line(),
            location.column()
        );
    } else {
        let _ = writeln!(LOGGER.serial.lock(), "PANIC: {} (no location info)", info.message());
    }

    /*
     * If the `qemu_exit` feature is set, we use the debug port to exit.
     */
    #[cfg(feature = "qemu_exit")]
    {
        use hal_x86::hw::qemu::{ExitCode, ExitPort};
        unsafe { ExitPort::new() }.exit(ExitCode::Failed)
    }

    #[allow(unreachable_code)]
    loop {
        unsafe {
            core::arch::asm!("cli", "hlt");
        }
    }
}
