//! Benchmark for tokenize -> parse -> compile -> link throughput.
//!
//! Grounded on `examples/MikuroXina-bms-rs/benches/parse_bms.rs`'s
//! per-file `Criterion::benchmark_group` + `Throughput::Bytes` shape;
//! the corpus here is a handful of representative scores embedded in
//! the binary rather than scanned off disk, since this crate carries no
//! `tests/files`-style fixture directory.

use chiptune_score::Score;
use criterion::{Criterion, Throughput};

struct Sample {
    name: &'static str,
    source: &'static str,
}

const SAMPLES: &[Sample] = &[
    Sample {
        name: "minimal_note",
        source: "v:128;a:c4;s:4;r",
    },
    Sample {
        name: "instrument_and_waveform",
        source: "[instr vol; v:0:1:255:0:0];[wave sq2; data:!\"AAECAw==\"];i:vol;w:sq2;a:c4;s:1",
    },
    Sample {
        name: "group_call_loop",
        source: "[grp:0; a:c4;s:1;a:e4;s:1;a:g4;s:1;x]\ng:0",
    },
    Sample {
        name: "multi_track_with_effect",
        source: concat!(
            "[track 1; v:200;w:sqr;e:vb:6:50:0;a:c4;s:2;a:d4;s:2;r;s:4]\n",
            "[track 2; v:160;w:tri;a:c3;s:4;r]\n",
            "tr:1/60"
        ),
    },
];

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_str");
    for sample in SAMPLES {
        group.throughput(Throughput::Bytes(sample.source.len() as u64));
        group.bench_function(sample.name, |b| {
            b.iter(|| Score::compile_str(std::hint::black_box(sample.source)));
        });
    }
    group.finish();
}

fn main() {
    let mut criterion = Criterion::default();
    bench_compile(&mut criterion);
}
