use std::{env, fs, path::PathBuf};

macro_rules! assert_unique_features {
    () => {};

    ( $first:tt $(,$rest:tt)* ) => {
        $(
            #[cfg(all(feature = $first, feature = $rest))]
            compile_error!(concat!("Features \"", $first, "\" and \"", $rest, "\" cannot be used together"));
        )*
        assert_unique_features!($($rest),*);
    };
}

struct Variant {
    name: &'static str,
    flash_kib: u32,
    sram_kib: u32,
    fpu: bool,
}

const VARIANTS: [Variant; 5] = [
    Variant { name: "lpc4072", flash_kib: 64, sram_kib: 16, fpu: false },
    Variant { name: "lpc4074", flash_kib: 128, sram_kib: 32, fpu: false },
    Variant { name: "lpc4076", flash_kib: 256, sram_kib: 64, fpu: true },
    Variant { name: "lpc4078", flash_kib: 512, sram_kib: 64, fpu: true },
    Variant { name: "lpc4088", flash_kib: 512, sram_kib: 64, fpu: true },
];

fn selected() -> &'static Variant {
    VARIANTS
        .iter()
        .find(|v| env::var_os(format!("CARGO_FEATURE_{}", v.name.to_uppercase())).is_some())
        // Same default as `Variant::TARGET`.
        .unwrap_or(&VARIANTS[4])
}

fn check_target(variant: &Variant) {
    let target = env::var("TARGET").expect("$TARGET unset");
    if !target.starts_with("thumb") {
        return;
    }
    let hard_float = target.ends_with("eabihf");
    if hard_float && !variant.fpu {
        panic!(
            "{} has no FPU, build for thumbv7em-none-eabi instead of {}",
            variant.name, target
        );
    }
    if !hard_float && variant.fpu {
        println!(
            "cargo:warning={} has an FPU but {} does not use it; thumbv7em-none-eabihf is expected",
            variant.name, target
        );
    }
}

fn main() {
    assert_unique_features!("lpc4072", "lpc4074", "lpc4076", "lpc4078", "lpc4088");

    let variant = selected();
    check_target(variant);

    let out = PathBuf::from(env::var_os("OUT_DIR").expect("$OUT_DIR unset"));
    let memory = format!(
        "/* {} */\nMEMORY\n{{\n  FLASH : ORIGIN = 0x00000000, LENGTH = {}K\n  RAM : ORIGIN = 0x10000000, LENGTH = {}K\n}}\n",
        variant.name, variant.flash_kib, variant.sram_kib
    );
    fs::write(out.join("memory.x"), memory).expect("Could not write memory.x");

    if env::var_os("CARGO_FEATURE_RT").is_some() {
        // Vectors are trampolines defined in `interrupt`; nothing to PROVIDE.
        fs::write(out.join("device.x"), "/* LPC40xx: 41 interrupt vectors */\n")
            .expect("Could not write device.x");
    }

    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed=build.rs");
}
