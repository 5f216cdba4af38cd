//! A deliberately plain workload: row-major `f32` matrices and a few
//! operations over them, each instrumented with a timed region. The
//! arithmetic has no concurrency of its own; it exists to drive the
//! tracing engine.

use rand::Rng;
use traceme::Profiler;

pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, value: f32) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn random<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        Matrix {
            rows,
            cols,
            data: (0..rows * cols).map(|_| rng.gen_range(-1.0..1.0)).collect(),
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.cols + col] = value;
    }

    pub fn print(&self) {
        for row in 0..self.rows {
            for col in 0..self.cols {
                print!("{} ", self.get(row, col));
            }
            println!();
        }
    }
}

/// Elementwise sum. Panics on mismatched dimensions; that is a caller
/// precondition, not a tracing concern.
pub fn add(profiler: &Profiler, a: &Matrix, b: &Matrix) -> Matrix {
    assert_eq!(a.rows, b.rows, "add: row count mismatch");
    assert_eq!(a.cols, b.cols, "add: column count mismatch");
    let _region = profiler.start_region(profiler.intern("tensor.add"));

    let mut out = Matrix::new(a.rows, a.cols, 0.0);
    for i in 0..a.data.len() {
        out.data[i] = a.data[i] + b.data[i];
    }
    out
}

/// Elementwise `max(x, 0)`.
pub fn relu(profiler: &Profiler, a: &Matrix) -> Matrix {
    let _region = profiler.start_region(profiler.intern("tensor.relu"));

    let mut out = Matrix::new(a.rows, a.cols, 0.0);
    for i in 0..a.data.len() {
        out.data[i] = a.data[i].max(0.0);
    }
    out
}

/// Naive matrix product. Emits a counter with the multiply-accumulate
/// count alongside its timed region.
pub fn matmul(profiler: &Profiler, a: &Matrix, b: &Matrix) -> Matrix {
    assert_eq!(
        a.cols, b.rows,
        "matmul: inner dimensions must agree"
    );
    let _region = profiler.start_region(profiler.intern("tensor.matmul"));

    let mut out = Matrix::new(a.rows, b.cols, 0.0);
    for i in 0..a.rows {
        for j in 0..b.cols {
            let mut acc = 0.0;
            for k in 0..a.cols {
                acc += a.get(i, k) * b.get(k, j);
            }
            out.set(i, j, acc);
        }
    }

    profiler.counter(
        profiler.intern("tensor.matmul.macs"),
        (a.rows * b.cols * a.cols) as i64,
    );
    out
}
