use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use workhive::{
    Pool, PoolError,
    logging::{self, LogConfig},
};

fn main() -> Result<(), PoolError> {
    logging::init(LogConfig {
        level: tracing::Level::DEBUG,
        ..Default::default()
    });

    let pool = Pool::builder()
        .capacity(4)
        .expiry(Duration::from_millis(500))
        .panic_handler(|fault| eprintln!("task on worker {} failed: {}", fault.worker, fault.message))
        .build()?;

    let done = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    for i in 0..16 {
        let done = Arc::clone(&done);
        pool.submit(move || {
            if i == 5 {
                panic!("task {i} hit a bad record");
            }
            thread::sleep(Duration::from_millis(100));
            done.fetch_add(1, Ordering::SeqCst);
        })?;
    }

    while done.load(Ordering::SeqCst) < 15 {
        thread::sleep(Duration::from_millis(10));
    }
    println!("15 tasks finished in {:?}", started.elapsed());
    println!("{:?}", pool.stats());

    // Let the reaper evict the idle workers
    thread::sleep(Duration::from_millis(1200));
    println!("after expiry: {:?}", pool.stats());

    pool.release();
    assert!(matches!(pool.submit(|| {}), Err(PoolError::PoolClosed)));

    pool.restart();
    pool.submit(|| println!("running again after restart"))?;
    thread::sleep(Duration::from_millis(50));

    Ok(())
}
