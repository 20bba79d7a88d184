use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tuner_core::synth::sine_wave;
use tuner_core::{Analyzer, AudioFrame, DetectionStrategy, TunerConfig};

// One frame must be analysed well within one buffer period
// (2048 samples at 44.1 kHz is about 46 ms).
pub fn process_frame_benchmark(c: &mut Criterion) {
    const SAMPLE_RATE: u32 = 44100;
    const SIZE: usize = 2048;

    let frame = AudioFrame::new(sine_wave(329.63, SAMPLE_RATE, SIZE, 0.5), SAMPLE_RATE);

    for strategy in [
        DetectionStrategy::Autocorrelation,
        DetectionStrategy::ZeroCrossing,
        DetectionStrategy::Spectral,
    ] {
        let config = TunerConfig::default()
            .with_strategy(strategy)
            .with_frame_size(SIZE);
        let analyzer = Analyzer::new(config).unwrap();
        c.bench_function(&format!("process_frame {}", strategy), |b| {
            b.iter(|| analyzer.process_frame(black_box(&frame)))
        });
    }
}

criterion_group!(benches, process_frame_benchmark);
criterion_main!(benches);
