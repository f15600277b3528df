//! Benchmarks the per-window pipeline (§4.4) on a synthetic bundle of
//! straight tracks, the same shape `tf-engine`'s own integration tests use.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tf_config::{Iteration, Parameters};
use tf_events::WindowCounters;
use tf_model::{FieldSlice, Hit, HitKey, Station};
use tf_state::{HitStoreBuilder, WindowState};

fn station(id: u16, z: f64) -> Station {
    Station { detector_id: id, z, field_present: false, time_info: true, x_max: 200.0, y_max: 200.0, field_slice: FieldSlice::zero() }
}

fn hit(id: u32, station: u16, x: f64, y: f64, z: f64, t: f64, front: HitKey, back: HitKey) -> Hit {
    Hit {
        id,
        station,
        x,
        y,
        z,
        t,
        dx2: 0.02 * 0.02,
        dy2: 0.02 * 0.02,
        dxy: 0.0,
        dt2: 0.05 * 0.05,
        range_x: 0.1,
        range_y: 0.1,
        range_t: 0.3,
        front_key: front,
        back_key: back,
    }
}

/// `n_tracks` straight lines fanned out in slope across 7 stations, each
/// track's hits using their own private key pair.
fn bundle(n_tracks: usize) -> (Parameters, tf_state::HitStore) {
    const N_STATIONS: usize = 7;
    let mut params = Parameters::default_cbm_like();
    params.stations = (0..N_STATIONS).map(|i| station(i as u16, 10.0 + 20.0 * i as f64)).collect();
    let mut it = Iteration::default_primary();
    it.min_nhits = 5;
    it.min_nhits_station0 = 5;
    params.iterations = vec![it];

    let mut hits = Vec::with_capacity(n_tracks * N_STATIONS);
    for track in 0..n_tracks {
        let tx = -0.4 + 0.8 * (track as f64) / (n_tracks.max(1) as f64);
        let ty = 0.1;
        for station_idx in 0..N_STATIONS {
            let z = 10.0 + 20.0 * station_idx as f64;
            let id = hits.len() as u32;
            let key_base = 2 * id;
            hits.push(hit(id, station_idx as u16, tx * z, ty * z, z, 5.0, key_base, key_base + 1));
        }
    }
    let n_hit_keys = 2 * hits.len() as u32;
    let store = HitStoreBuilder::new(n_hit_keys).with_hits(hits).with_stream_starts(vec![0]).build().unwrap();
    (params, store)
}

fn bench_run_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_window");
    for &n_tracks in &[1usize, 8, 32] {
        let (params, store) = bundle(n_tracks);
        let counters = WindowCounters::new();
        group.bench_with_input(BenchmarkId::from_parameter(n_tracks), &n_tracks, |b, _| {
            b.iter(|| {
                let mut window = WindowState::new(params.active_station_count(), store.n_hit_keys());
                tf_engine::read_window_data(&store, &params, 0.0, 1000.0, &mut window);
                tf_engine::run_window(&mut window, &params, &counters);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_run_window);
criterion_main!(benches);
