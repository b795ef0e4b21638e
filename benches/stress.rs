use std::time::{Duration, Instant};

use tokio_postgres::{Config, NoTls};
use ulid::Ulid;

async fn connect(host: &str, port: u16) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname("rentd")
        .user("rentd")
        .password("rentd");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

/// Valid 2-day rental window for iteration i, spread across the 2024 calendar.
fn date_pair(i: usize) -> (String, String) {
    let month = (i / 27) % 12 + 1;
    let day = i % 27 + 1;
    (
        format!("2024-{month:02}-{day:02}"),
        format!("2024-{month:02}-{:02}", day + 1),
    )
}

async fn seed_equipment(client: &tokio_postgres::Client, stock: i64) -> String {
    let name = format!("gear_{}", Ulid::new());
    client
        .batch_execute(&format!(
            "INSERT INTO equipment (name, price_per_day, stock) VALUES ('{name}', 10000, {stock})"
        ))
        .await
        .unwrap();
    name
}

async fn insert_booking(client: &tokio_postgres::Client, item: &str, i: usize) {
    let code = format!("BK-{}", Ulid::new());
    let (rent, ret) = date_pair(i);
    client
        .batch_execute(&format!(
            r#"INSERT INTO bookings (booking_code, user_name, items, rent_date, return_date, payment_method, status) VALUES ('{code}', 'bench', '["{item}"]', '{rent}', '{ret}', 'cash', 'PendingPayment')"#
        ))
        .await
        .unwrap();
}

async fn phase1_sequential(host: &str, port: u16) {
    let client = connect(host, port).await;
    let name = seed_equipment(&client, 1_000_000).await;

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        insert_booking(&client, &name, i).await;
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_concurrent(host: &str, port: u16) {
    let n_tasks = 10;
    let n_per_task = 200;

    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..n_tasks {
        let host = host.to_string();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let name = seed_equipment(&client, 1_000_000).await;
            for j in 0..n_per_task {
                insert_booking(&client, &name, j).await;
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_read_under_load(host: &str, port: u16) {
    // Pre-fill so the stock scan has a non-trivial active set
    let setup_client = connect(host, port).await;
    let name = seed_equipment(&setup_client, 1_000_000).await;
    for i in 0..200 {
        insert_booking(&setup_client, &name, i).await;
    }
    drop(setup_client);

    // Writer tasks: continuously add bookings in the background
    let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for _ in 0..5 {
        let host = host.to_string();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let wname = seed_equipment(&client, 1_000_000).await;
            let mut i = 0usize;
            while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                let code = format!("BK-{}", Ulid::new());
                let (rent, ret) = date_pair(i);
                let _ = client
                    .batch_execute(&format!(
                        r#"INSERT INTO bookings (booking_code, user_name, items, rent_date, return_date, payment_method, status) VALUES ('{code}', 'bench', '["{wname}"]', '{rent}', '{ret}', 'cash', 'PendingPayment')"#
                    ))
                    .await;
                i += 1;
            }
        }));
    }

    // Reader tasks: stock queries against their own item, measuring latency
    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();

    for _ in 0..n_readers {
        let host = host.to_string();
        reader_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let rname = seed_equipment(&client, 1_000_000).await;
            // Add some bookings to make the availability math non-trivial
            for i in 0..50 {
                insert_booking(&client, &rname, i).await;
            }

            let mut latencies = Vec::with_capacity(reads_per_reader);
            for i in 0..reads_per_reader {
                let (rent, ret) = date_pair(i);
                let t = Instant::now();
                client
                    .batch_execute(&format!(
                        "SELECT * FROM stock WHERE item = '{rname}' AND rent_date = '{rent}' AND return_date = '{ret}'"
                    ))
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }

    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("stock query", &mut all_latencies);
}

async fn phase4_connection_storm(host: &str, port: u16) {
    let n_conns = 50;
    let ops_per_conn = 10;

    let start = Instant::now();
    let mut handles = Vec::new();
    let success = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

    for _ in 0..n_conns {
        let host = host.to_string();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let name = seed_equipment(&client, 1_000_000).await;

            for i in 0..ops_per_conn {
                insert_booking(&client, &name, i).await;
            }
            success.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let ok = success.load(std::sync::atomic::Ordering::Relaxed);
    println!(
        "  {n_conns} connections, {ops_per_conn} ops each: {ok}/{n_conns} succeeded in {:.2}s",
        elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let host = std::env::var("RENTD_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("RENTD_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid RENTD_PORT");

    println!("=== rentd stress benchmark ===");
    println!("target: {host}:{port}\n");

    println!("[phase 1] sequential write throughput");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] concurrent write throughput");
    phase2_concurrent(&host, port).await;

    println!("\n[phase 3] stock query latency under write load");
    phase3_read_under_load(&host, port).await;

    println!("\n[phase 4] connection storm");
    phase4_connection_storm(&host, port).await;

    println!("\n=== benchmark complete ===");
}
