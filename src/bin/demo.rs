use cordyceps_avl::AvlMap;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut map = AvlMap::new();

    for key in [10, 20, 30, 5, 15, 25, 35, 1] {
        map.insert(key, key * 100);
        map.assert_invariants();
        tracing::info!(key, height = map.height(), "inserted");
    }

    println!("{:?}", map.keys().collect::<Vec<_>>());

    map.insert(20, 0);
    map.assert_invariants();

    for key in [20, 10, 99] {
        let removed = map.remove(&key);
        map.assert_invariants();
        tracing::info!(key, ?removed, height = map.height(), "removed");
    }

    println!("{map:?}");

    match map.at(&20) {
        Ok(value) => println!("20 => {value}"),
        Err(err) => println!("20: {err}"),
    }
}
