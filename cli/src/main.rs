//! chip86 — headless CHIP-8 dynarec runner.
//!
//! Loads a ROM, runs the translate/execute dispatch cycle for a fixed
//! number of ticks and optionally dumps the framebuffer as ASCII.
//! There is no window or input layer here; the keypad stays released.

use std::env;
use std::fs;
use std::process;

use chip86_core::chip8::{NEW_FRAME, NO_NEW_FRAME, PIXEL_ON, RES_HEIGHT, RES_WIDTH};
use chip86_core::Chip8State;
use chip86_exec::{DispatchStats, TranslationCache};
use chip86_frontend::Translator;

struct Args {
    rom_path: String,
    ticks: u64,
    opcount: u32,
    seed: Option<u32>,
    dump: bool,
}

fn usage() -> ! {
    eprintln!("usage: chip86 <rom> [--ticks N] [--opcount N] [--seed N] [--dump]");
    eprintln!();
    eprintln!("  --ticks N    dispatch iterations to run (default 1000)");
    eprintln!("  --opcount N  guest ops per tick (default 10)");
    eprintln!("  --seed N     fix the RNG seed");
    eprintln!("  --dump       print the framebuffer and registers on exit");
    eprintln!();
    eprintln!("set CHIP86_STATS=1 for dispatch statistics on stderr");
    process::exit(1);
}

fn parse_args() -> Args {
    let mut args = Args {
        rom_path: String::new(),
        ticks: 1000,
        opcount: 10,
        seed: None,
        dump: false,
    };

    let argv: Vec<String> = env::args().skip(1).collect();
    let mut it = argv.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--ticks" => {
                let val = it.next().unwrap_or_else(|| usage());
                args.ticks = val.parse().unwrap_or_else(|_| usage());
            }
            "--opcount" => {
                let val = it.next().unwrap_or_else(|| usage());
                args.opcount = val.parse().unwrap_or_else(|_| usage());
            }
            "--seed" => {
                let val = it.next().unwrap_or_else(|| usage());
                args.seed = Some(val.parse().unwrap_or_else(|_| usage()));
            }
            "--dump" => args.dump = true,
            _ if args.rom_path.is_empty() && !arg.starts_with('-') => {
                args.rom_path = arg.clone();
            }
            _ => usage(),
        }
    }

    if args.rom_path.is_empty() {
        usage();
    }
    args
}

fn dump_screen(state: &Chip8State) {
    for y in 0..RES_HEIGHT {
        let mut line = String::with_capacity(RES_WIDTH);
        for x in 0..RES_WIDTH {
            line.push(if state.screen[y][x] == PIXEL_ON {
                '#'
            } else {
                '.'
            });
        }
        println!("{line}");
    }
    for (i, v) in state.v.iter().enumerate() {
        print!("V{i:X}={v:02x} ");
    }
    println!();
    println!("pc={:#05x} i={:#05x}", state.pc, state.i);
}

fn main() {
    let args = parse_args();

    let rom = match fs::read(&args.rom_path) {
        Ok(rom) => rom,
        Err(err) => {
            eprintln!("chip86: {}: {}", args.rom_path, err);
            process::exit(1);
        }
    };

    let mut state = Chip8State::new();
    if let Some(seed) = args.seed {
        state.reset_with_seed(seed);
    }
    if !state.load_rom(&rom) {
        eprintln!("chip86: {}: rom too large", args.rom_path);
        process::exit(1);
    }

    let mut translator = Translator::new(&state);
    let mut cache = TranslationCache::new();
    let mut stats = DispatchStats::default();

    for _ in 0..args.ticks {
        stats.ticks += 1;
        let mut pc = state.pc;

        // SAFETY: `state` is boxed and outlives the cache; every
        // cached block was translated against it.
        if unsafe { cache.execute_n(&mut pc, args.opcount) } {
            state.pc = pc;
            stats.exec_ticks += 1;
            state.tick_timers();
            if state.new_frame == NEW_FRAME {
                // A renderer would swap buffers here.
                state.new_frame = NO_NEW_FRAME;
            }
        } else {
            stats.misses += 1;
            loop {
                let opcode = state.fetch(pc);
                if !translator.emit(opcode, &mut pc) {
                    break;
                }
            }
            while let Some(block) = translator.next_block() {
                stats.translated_blocks += 1;
                let _ = cache.insert(block);
            }
            state.pc = pc;
        }
    }

    if args.dump {
        dump_screen(&state);
    }
    if env::var("CHIP86_STATS").is_ok() {
        eprint!("{stats}");
    }
}
