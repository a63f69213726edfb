//! Motion controller tick throughput, grounded on `src/motion.rs`.
//!
//! The ISR-context `tick()` is the hard real-time budget of the whole
//! firmware: it must complete well inside one step interval (10 µs at
//! `c_min`) on the target MCU. This benchmark measures tick cost in
//! isolation on the host so a regression here is visible before it ever
//! reaches hardware.

use criterion::{Criterion, criterion_group, criterion_main};

use pump_common::hal::{DigitalOutputPin, MicrosecondTimer};
use pump_core::motion::MotionController;

#[derive(Default)]
struct NullPin;
impl DigitalOutputPin for NullPin {
    fn set_high(&mut self) {}
    fn set_low(&mut self) {}
}

#[derive(Default)]
struct NullTimer;
impl MicrosecondTimer for NullTimer {
    fn schedule_after(&mut self, _micros: u32) {}
    fn cancel(&mut self) {}
}

fn controller() -> MotionController<NullPin, NullTimer> {
    MotionController::new(NullPin, NullTimer)
}

fn bench_tick_through_full_trapezoid(c: &mut Criterion) {
    c.bench_function("motion_tick_trapezoid", |b| {
        b.iter(|| {
            let mut mc = controller();
            mc.configure(2000, 2000.0, 400.0, 400.0);
            mc.create_motion_profile().unwrap();
            mc.run();
            while mc.steps_performed() < 2000 {
                mc.tick();
            }
        });
    });
}

fn bench_single_ramp_up_tick(c: &mut Criterion) {
    let mut mc = controller();
    mc.configure(1_000_000, 2000.0, 400.0, 400.0);
    mc.create_motion_profile().unwrap();
    mc.run();

    c.bench_function("motion_tick_single", |b| {
        b.iter(|| mc.tick());
    });
}

criterion_group!(benches, bench_tick_through_full_trapezoid, bench_single_ramp_up_tick);
criterion_main!(benches);
