use anyhow::{Context, Result};

use kernelrun_engine::device::{DeviceFilter, Enumerator, EnumeratorConfig};
use kernelrun_engine::logging::{init_logging, LoggingConfig};
use kernelrun_engine::memory::{AccessFlags, Buffer};
use kernelrun_engine::program::Program;
use kernelrun_engine::session::{Session, SessionConfig};
use kernelrun_engine::teardown::Teardown;

const BUNDLED_KERNEL: &str = include_str!("../kernels/vecsum.wgsl");
const ENTRY_POINT: &str = "vector_sum";
const ELEMENTS: usize = 256;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let source = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read kernel source `{path}`"))?,
        None => BUNDLED_KERNEL.to_string(),
    };
    let vendors = vendor_priority();

    let enumerator = Enumerator::new(EnumeratorConfig {
        device_filter: device_filter()?,
        ..Default::default()
    });

    println!();
    for platform in enumerator.list_platforms().context("failed to list compute platforms")? {
        println!("  platform {}", platform.name());
        for device in enumerator.list_devices(&platform, DeviceFilter::Any) {
            let info = device.info();
            println!("    {:<40} {:<10} {:?}", info.name, info.vendor, info.class);
        }
    }

    let device = enumerator
        .select_device(&vendors)
        .with_context(|| format!("no device from vendors {vendors:?}"))?;
    let session = Session::open(&device, &SessionConfig::default())
        .context("failed to open a compute session")?;
    println!("  using    {} ({})", device.info().name, device.info().vendor);
    println!();

    let mut scope = Teardown::new(session);
    let c = vector_sum(&mut scope, &source)?;

    for (i, value) in c.iter().enumerate().take(8) {
        println!("  c[{i:>3}] = {value}");
    }
    println!("  ...");
    println!("  c[{:>3}] = {}", ELEMENTS - 1, c[ELEMENTS - 1]);

    let mismatches = c
        .iter()
        .enumerate()
        .filter(|&(i, &v)| v != expected(i))
        .count();
    anyhow::ensure!(mismatches == 0, "{mismatches} of {ELEMENTS} results are wrong");
    println!();
    println!("  {ELEMENTS} results verified");

    let ledger = scope.release_all();
    log::info!("released {} handle(s)", ledger.released_count());
    Ok(())
}

/// a[i] = i², b[i] = i, c = a + b.
fn vector_sum(scope: &mut Teardown, source: &str) -> Result<Vec<f32>> {
    let a: Vec<f32> = (0..ELEMENTS).map(|i| (i * i) as f32).collect();
    let b: Vec<f32> = (0..ELEMENTS).map(|i| i as f32).collect();
    let mut c = vec![0.0f32; ELEMENTS];
    let bytes = ELEMENTS * std::mem::size_of::<f32>();

    let program = Program::from_source(scope.session(), source)?;
    let program = scope.adopt(program);
    program
        .build_with_notify("", |log| eprintln!("{log}"))
        .context("kernel build failed")?;

    let kernel = program.create_kernel(ENTRY_POINT)?;
    let kernel = scope.adopt(kernel);

    let a_buf = allocate(scope, bytes, AccessFlags::ReadOnly)?;
    let b_buf = allocate(scope, bytes, AccessFlags::ReadOnly)?;
    let c_buf = allocate(scope, bytes, AccessFlags::WriteOnly)?;

    kernel.set_argument(0, &a_buf)?;
    kernel.set_argument(1, &b_buf)?;
    kernel.set_argument(2, &c_buf)?;

    let queue = scope.session().queue()?;
    let wrote_a = queue.enqueue_write(&a_buf, &a, false, &[])?;
    let wrote_b = queue.enqueue_write(&b_buf, &b, false, &[])?;
    let ran = queue.dispatch(&kernel, &[ELEMENTS], None, &[wrote_a, wrote_b])?;
    queue.enqueue_read(&c_buf, &mut c, false, &[ran])?.wait()?;

    Ok(c)
}

fn allocate(scope: &mut Teardown, size: usize, access: AccessFlags) -> Result<Buffer> {
    let buffer = Buffer::allocate(scope.session(), size, access)?;
    Ok(scope.adopt(buffer))
}

fn expected(i: usize) -> f32 {
    (i * i + i) as f32
}

/// `KERNELRUN_VENDORS`, comma separated; Intel, AMD, NVIDIA otherwise.
fn vendor_priority() -> Vec<String> {
    match std::env::var("KERNELRUN_VENDORS") {
        Ok(list) => list.split(',').map(|v| v.trim().to_string()).collect(),
        Err(_) => ["Intel", "AMD", "NVIDIA"].map(String::from).to_vec(),
    }
}

fn device_filter() -> Result<DeviceFilter> {
    let Ok(value) = std::env::var("KERNELRUN_DEVICE") else {
        return Ok(DeviceFilter::Gpu);
    };
    match value.to_ascii_lowercase().as_str() {
        "gpu" => Ok(DeviceFilter::Gpu),
        "cpu" => Ok(DeviceFilter::Cpu),
        "other" => Ok(DeviceFilter::Other),
        "any" => Ok(DeviceFilter::Any),
        other => anyhow::bail!("KERNELRUN_DEVICE must be gpu, cpu, other or any (got `{other}`)"),
    }
}
