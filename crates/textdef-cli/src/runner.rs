use std::fmt::Display;

pub struct UnitPrinter {
    value: f64,
    suffixes: &'static [(&'static str, f64)],
}

#[allow(non_upper_case_globals)]
impl UnitPrinter {
    pub fn bytes(value: f64) -> Self {
        const KiB: f64 = 1.0 / 1024.0;

        Self {
            value,
            suffixes: &[("GiB", KiB * KiB * KiB), ("MiB", KiB * KiB), ("KiB", KiB), ("B", 1.0)],
        }
    }
    pub fn seconds(value: f64) -> Self {
        const ms: f64 = 1000.0;
        Self {
            value,
            suffixes: &[
                ("s", 1.0),
                ("ms", ms),
                ("µs", ms * ms),
                ("ns", ms * ms * ms),
            ],
        }
    }
}

impl Display for UnitPrinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut best: Option<(f64, &'static str)> = None;

        for &(name, factor) in self.suffixes {
            let value = self.value * factor;

            let mut new_best = true;
            if let Some((best, _)) = best {
                if best >= 1.0 {
                    new_best = value < best && value >= 1.0;
                } else {
                    new_best = value > best;
                }
            }

            if new_best {
                best = Some((value, name));
            }
        }

        match best {
            Some((value, suffix)) => write!(f, "{value:.2} {suffix}"),
            None => write!(f, "{:.2}", self.value),
        }
    }
}

/// Runs a phase `iters` times, optionally reporting the average time and throughput.
pub struct PhaseRunner {
    bytes: usize,
    do_bench: bool,
    iters: u32,
}

impl PhaseRunner {
    pub fn new(bytes: usize, do_bench: bool, iters: u32) -> PhaseRunner {
        PhaseRunner {
            bytes,
            do_bench,
            iters: iters.max(1),
        }
    }
    pub fn run<F: FnMut() -> T, T>(&self, name: &str, mut fun: F) -> T {
        let start = std::time::Instant::now();

        let mut output = fun();
        for _ in 1..self.iters {
            output = fun();
        }

        let elapsed = (start.elapsed() / self.iters).as_secs_f64();
        log::debug!("{name} took {elapsed}s per iteration");

        if self.do_bench {
            let throughput = UnitPrinter::bytes((self.bytes as f64) / elapsed);
            let time = UnitPrinter::seconds(elapsed);
            eprintln!("{name}\t {time}\t {throughput}/s");
        }

        output
    }
}

#[test]
fn test_unit_printer() {
    assert_eq!(UnitPrinter::seconds(0.0025).to_string(), "2.50 ms");
    assert_eq!(UnitPrinter::seconds(3.0).to_string(), "3.00 s");
    assert_eq!(UnitPrinter::bytes(2048.0).to_string(), "2.00 KiB");
    assert_eq!(UnitPrinter::bytes(100.0).to_string(), "100.00 B");
}

#[test]
fn test_runner_repeats() {
    let mut calls = 0;
    let runner = PhaseRunner::new(10, false, 3);
    let result = runner.run("count", || {
        calls += 1;
        calls
    });
    assert_eq!(result, 3);
    assert_eq!(calls, 3);
}
