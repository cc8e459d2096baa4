use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fxkit_dsp::coefficients;
use fxkit_dsp::{
    ChorusVoices, Crossover, CrossoverOrder, EnvelopeFollower, FilterBank, NoiseColor,
    NoiseSource, SplitTopology, StereoMatrix,
};

const BLOCK: usize = 512;
const SAMPLE_RATE: f32 = 48000.0;

fn input_block() -> Vec<f32> {
    let mut noise = NoiseSource::new(1, NoiseColor::White);
    (0..BLOCK).map(|_| noise.next()).collect()
}

fn bench_filter_bank(c: &mut Criterion) {
    let input = input_block();
    let mut bank = FilterBank::new(2, 7);
    bank.set_role(0, coefficients::high_pass(SAMPLE_RATE, 30.0, 0.707));
    bank.set_role(1, coefficients::low_shelf(SAMPLE_RATE, 120.0, 0.707, 3.0));
    bank.set_role(2, coefficients::peak(SAMPLE_RATE, 400.0, 1.0, -2.0));
    bank.set_role(3, coefficients::peak(SAMPLE_RATE, 2000.0, 1.0, 1.5));
    bank.set_role(4, coefficients::peak(SAMPLE_RATE, 6000.0, 1.0, 2.0));
    bank.set_role(5, coefficients::high_shelf(SAMPLE_RATE, 10000.0, 0.707, 1.0));
    bank.set_role(6, coefficients::low_pass(SAMPLE_RATE, 18000.0, 0.707));

    let mut buf = input.clone();
    c.bench_function("filter_bank_7_roles_stereo", |b| {
        b.iter(|| {
            for ch in 0..2 {
                buf.copy_from_slice(&input);
                bank.process_block(ch, &mut buf);
            }
            black_box(&buf);
        })
    });
}

fn bench_crossover(c: &mut Criterion) {
    let input = input_block();
    let mut group = c.benchmark_group("crossover_3_band");
    for order in [CrossoverOrder::Lr12, CrossoverOrder::Lr24, CrossoverOrder::Lr48] {
        for topology in [SplitTopology::Complementary, SplitTopology::LinkwitzRiley] {
            let mut xo = Crossover::new(SAMPLE_RATE, order, topology, &[200.0, 2000.0], 1);
            let mut bands = [0.0f32; 3];
            let id = format!("{}dB/{:?}", order.db_per_octave(), topology);
            group.bench_function(BenchmarkId::from_parameter(id), |b| {
                b.iter(|| {
                    for &x in &input {
                        xo.process(0, x, &mut bands);
                    }
                    black_box(bands);
                })
            });
        }
    }
    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let input = input_block();
    let mut env = EnvelopeFollower::new(SAMPLE_RATE, 5.0, 80.0);
    c.bench_function("envelope_follower", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &x in &input {
                acc += env.process(x);
            }
            black_box(acc)
        })
    });
}

fn bench_chorus(c: &mut Criterion) {
    let input = input_block();
    let mut chorus = ChorusVoices::new(4096, 4);
    chorus.set_base_delay(960.0);
    chorus.set_depth(240.0);
    chorus.set_rate(0.8, SAMPLE_RATE);
    c.bench_function("chorus_4_voices", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &x in &input {
                acc += chorus.process(x);
            }
            black_box(acc)
        })
    });
}

fn bench_stereo_and_noise(c: &mut Criterion) {
    let input = input_block();
    let matrix = StereoMatrix::new(1.4);
    let mut left = input.clone();
    let mut right = input.clone();
    c.bench_function("stereo_matrix", |b| {
        b.iter(|| {
            left.copy_from_slice(&input);
            right.copy_from_slice(&input);
            matrix.process_block(&mut left, &mut right);
            black_box((&left, &right));
        })
    });

    let mut pink = NoiseSource::new(9, NoiseColor::Pink);
    let mut out = vec![0.0f32; BLOCK];
    c.bench_function("pink_noise", |b| {
        b.iter(|| {
            pink.fill(&mut out);
            black_box(&out);
        })
    });
}

criterion_group!(
    benches,
    bench_filter_bank,
    bench_crossover,
    bench_envelope,
    bench_chorus,
    bench_stereo_and_noise
);
criterion_main!(benches);
