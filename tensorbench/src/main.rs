use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

use traceme::{Config, Profiler};

mod matrix;

use crate::matrix::{add, matmul, relu, Matrix};

#[derive(Parser, Debug)]
#[command(about = "Runs an instrumented tensor workload and writes a trace file")]
struct Opt {
    /// Square matrix dimension
    #[arg(long, default_value_t = 64)]
    size: usize,

    /// Number of workload iterations
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Where to write the trace document
    #[arg(long, default_value = "tensorbench_trace.json")]
    trace_output: PathBuf,

    /// Ring buffer capacity per thread
    #[arg(long, default_value_t = 1 << 15)]
    capacity: usize,

    /// Run the workload with tracing disabled
    #[arg(long)]
    disabled: bool,

    /// Print the final result matrix
    #[arg(long)]
    print: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let opt = Opt::parse();

    let profiler = Profiler::new();
    profiler.configure(Config {
        enabled: !opt.disabled,
        per_thread_capacity: opt.capacity,
        trace_output_path: opt.trace_output.clone(),
        enable_native_signpost_integration: false,
    })?;

    let mut rng = rand::thread_rng();

    let setup = profiler.intern("setup");
    let iteration = profiler.intern("iteration");

    profiler.begin(setup);
    let a = Matrix::random(opt.size, opt.size, &mut rng);
    let b = Matrix::random(opt.size, opt.size, &mut rng);
    profiler.end(setup);

    let mut result = None;
    for _ in 0..opt.iterations {
        let _iteration = profiler.start_region(iteration);
        let sum = add(&profiler, &a, &b);
        let activated = relu(&profiler, &sum);
        result = Some(matmul(&profiler, &activated, &b));
    }
    profiler.mark(profiler.intern("workload.done"));

    if opt.print {
        if let Some(result) = &result {
            result.print();
        }
    }

    profiler.shutdown()?;
    println!("trace written to {}", opt.trace_output.display());
    Ok(())
}
