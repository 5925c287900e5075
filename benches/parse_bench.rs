use criterion::{Criterion, black_box, criterion_group, criterion_main};
use openscad_parse::parse;

const SAMPLE: &str = r"
// Parametric rounded box
module rounded_box(size = [10, 10, 10], r = 1, center = false) {
    if (r > 0) {
        minkowski() {
            cube(size - [2*r, 2*r, 2*r], center = center);
            sphere(r = r, $fn = 20);
        }
    } else {
        cube(size, center = center);
    }
}

function area(w, h) = w * h;
function volume(w, h, d) = w * h * d;
function clamp(val, lo, hi) = max(lo, min(hi, val));

sizes = [for (i = [1:10]) [i*10, i*5, i*3]];

for (i = [0:len(sizes)-1]) {
    translate([i * 50, 0, 0])
        rounded_box(size = sizes[i], r = clamp(i, 1, 5));
}

difference() {
    union() {
        cube([100, 100, 10], center = true);
        translate([0, 0, 5])
            cylinder(h = 20, r1 = 30, r2 = 20, $fn = 64);
    }
    translate([0, 0, -1])
        cylinder(h = 40, r = 15, $fn = 64);
}
";

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_sample", |b| {
        b.iter(|| parse(black_box(SAMPLE)).unwrap());
    });

    let large = SAMPLE.repeat(100);
    c.bench_function("parse_large_80kb", |b| {
        b.iter(|| parse(black_box(&large)).unwrap());
    });

    let deep = format!("x = {}1{};", "(".repeat(200), ")".repeat(200));
    c.bench_function("parse_deeply_nested", |b| {
        b.iter(|| parse(black_box(&deep)).unwrap());
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
