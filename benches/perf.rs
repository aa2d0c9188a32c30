use criterion::{Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::hint::black_box;

use bayrate::collection::{Collection, Game, PlayerIndex};
use bayrate::config::EngineConfig;
use bayrate::handicap::HandicapModel;
use bayrate::likelihood::Posterior;
use bayrate::optimizer::calc_ratings;
use bayrate::seeding::seed_players;
use bayrate::td_list::TdList;
use bayrate::uncertainty::{analytic_sigmas, integrated_sigmas};

fn round_robin(players: u32) -> Collection {
    let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut c = Collection::new("BENCH", "", date);
    for id in 1..=players {
        let rank = id as f64 * 1.5;
        let seed = if rank < 10.0 { 10.5 - rank } else { 9.5 - rank };
        c.add_player(id, seed);
    }
    for a in 1..=players {
        for b in (a + 1)..=players {
            c.add_game(Game {
                white: a,
                black: b,
                white_wins: (a + b) % 5 != 0,
                handicap: 0,
                komi: 7.5,
            });
        }
    }
    seed_players(&mut c, &TdList::new(), date);
    c
}

fn bench_posterior(c: &mut Criterion) {
    let coll = round_robin(24);
    let post = Posterior::build(&coll, &PlayerIndex::build(&coll), HandicapModel::Flat).unwrap();
    let r = post.closed_seeds();
    c.bench_function("log_posterior_24", |b| {
        b.iter(|| black_box(post.log_posterior(black_box(&r))))
    });
    c.bench_function("gradient_24", |b| b.iter(|| black_box(post.gradient(black_box(&r)))));
}

fn bench_sigmas(c: &mut Criterion) {
    let coll = round_robin(24);
    let post = Posterior::build(&coll, &PlayerIndex::build(&coll), HandicapModel::Flat).unwrap();
    let r = post.closed_seeds();
    c.bench_function("integrated_sigmas_24", |b| {
        b.iter(|| black_box(integrated_sigmas(&post, black_box(&r))))
    });
    c.bench_function("analytic_sigmas_24", |b| {
        b.iter(|| black_box(analytic_sigmas(&post, black_box(&r)).unwrap()))
    });
}

fn bench_calc_ratings(c: &mut Criterion) {
    let base = round_robin(16);
    let cfg = EngineConfig::default();
    c.bench_function("calc_ratings_round_robin_16", |b| {
        b.iter(|| {
            let mut coll = base.clone();
            let mut rng = StdRng::seed_from_u64(cfg.jitter_seed);
            let run = calc_ratings(&mut coll, &cfg, &mut rng).unwrap();
            black_box(run.gradient_iterations());
        })
    });
}

criterion_group!(perf, bench_posterior, bench_sigmas, bench_calc_ratings);
criterion_main!(perf);
