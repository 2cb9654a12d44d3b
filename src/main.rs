//! Virtual Core Emulator - CLI Entry Point
//!
//! Commands:
//! - `vcore-emu run <program>` - Run a binary image or `.s` source
//! - `vcore-emu asm <source>` - Assemble to a binary image
//! - `vcore-emu disasm <image>` - Disassemble a binary image
//! - `vcore-emu test` - Run the built-in self-test

use clap::{Parser, Subcommand};
use vcore::{Cpu, CpuState, Program, Reg};

#[derive(Parser)]
#[command(name = "vcore-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator for a 64-bit virtual core with 32-bit instruction words")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it terminates
    Run {
        /// Path to the binary image (or `.s` source, assembled on the fly)
        program: String,
        /// Register state file applied before the run (R0=0x..., one per line)
        #[arg(short, long)]
        state: Option<String>,
        /// Stop after at most this many cycles
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Print each executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final state as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Assemble source to a binary image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file (default: source with a .bin extension)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a binary image to readable text
    Disasm {
        /// Path to the binary image
        image: String,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            program,
            state,
            max_cycles,
            trace,
            json,
        }) => {
            run_program(&program, state.as_deref(), max_cycles, trace, json);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            disassemble_file(&image);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("Virtual Core Emulator v0.1.0");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_instruction_words();
        }
    }
}

/// Load a program from a binary image, or assemble it first when the
/// path points at a `.s` source file.
fn load_program(path: &str) -> Program {
    if path.ends_with(".s") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match vcore::assemble(&source) {
            Ok(words) => {
                println!("📝 Assembled {} instructions", words.len());
                Program::from_words(&words)
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match vcore::load_image(path) {
            Ok(program) => {
                println!("📂 Loaded {} instructions", program.word_count());
                program
            }
            Err(e) => {
                eprintln!("❌ Failed to load image: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_program(
    path: &str,
    state_path: Option<&str>,
    max_cycles: Option<u64>,
    trace: bool,
    json: bool,
) {
    println!("🔧 Running: {}", path);

    let program = load_program(path);
    if program.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    let mut cpu = Cpu::new(program);

    if let Some(state_path) = state_path {
        match vcore::load_state(state_path) {
            Ok(state) => {
                println!("📥 Loaded {} register values", state.len());
                cpu.load_registers(state.entries);
            }
            Err(e) => {
                eprintln!("❌ Failed to load state file: {}", e);
                std::process::exit(1);
            }
        }
    }

    println!();

    let limit = max_cycles.unwrap_or(u64::MAX);
    while cpu.is_running() && cpu.cycles < limit {
        let pc = cpu.regs.pc;
        match cpu.step() {
            Ok(instr) => {
                if trace {
                    let disasm = vcore::disassemble_word(vcore::encode(&instr));
                    println!(
                        "{:03}: {:<20} carry={} -> pc={}",
                        pc,
                        disasm,
                        cpu.regs.carry as u8,
                        cpu.regs.pc
                    );
                }
            }
            Err(e) => {
                eprintln!("❌ CPU fault at pc={}: {}", pc, e);
                std::process::exit(1);
            }
        }
    }

    if json {
        print_state_json(&cpu);
    } else {
        print_registers(&cpu);
        println!();
        match cpu.state {
            CpuState::Completed => println!("Program terminated successfully."),
            CpuState::Error => println!("Error: program counter out of bounds."),
            CpuState::Running => {
                println!(
                    "⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.",
                    limit
                );
            }
        }
    }

    if cpu.state == CpuState::Error {
        std::process::exit(1);
    }
}

fn print_registers(cpu: &Cpu) {
    println!("Registers:");
    for reg in Reg::all() {
        println!("{} = {:#x}", reg, cpu.regs.get(reg));
    }
}

fn print_state_json(cpu: &Cpu) {
    let registers: serde_json::Map<String, serde_json::Value> = Reg::all()
        .map(|reg| {
            (
                reg.to_string(),
                serde_json::Value::String(format!("{:#x}", cpu.regs.get(reg))),
            )
        })
        .collect();

    let report = serde_json::json!({
        "state": cpu.state,
        "cycles": cpu.cycles,
        "pc": cpu.regs.pc,
        "carry": cpu.regs.carry,
        "registers": registers,
    });

    println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
}

fn assemble_file(source_path: &str, output: Option<String>) {
    let out_path = output.unwrap_or_else(|| {
        source_path
            .strip_suffix(".s")
            .map(|stem| format!("{}.bin", stem))
            .unwrap_or_else(|| format!("{}.bin", source_path))
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let words = match vcore::assemble(&source) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} instructions", words.len());

    if let Err(e) = vcore::save_image(&out_path, &words) {
        eprintln!("❌ Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(image_path: &str) {
    println!("📖 Disassembling: {}", image_path);
    println!();

    let program = match vcore::load_image(image_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    print!("{}", vcore::disassemble(&program.words()));
}

fn demo_instruction_words() {
    use vcore::{encode, Condition, Instruction, Opcode, Operand};

    println!("━━━ Instruction Word Demo ━━━");
    println!();

    let samples = [
        Instruction::Alu {
            op: Opcode::Mov,
            src1: Reg::from_bits(0),
            operand2: Operand::Imm(5),
            dest: Reg::from_bits(1),
        },
        Instruction::Alu {
            op: Opcode::Add,
            src1: Reg::from_bits(1),
            operand2: Operand::Reg(Reg::from_bits(1)),
            dest: Reg::from_bits(2),
        },
        Instruction::Branch {
            cond: Condition::Ne,
            back: true,
            magnitude: 2,
        },
    ];

    for instr in &samples {
        let word = encode(instr);
        println!("  0x{:08x}  {}", word, vcore::disassemble_word(word));
    }
}

fn run_self_test() {
    use vcore::{decode, encode, Condition, Flags, Instruction, Opcode, Operand};

    println!("━━━ Virtual Core Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;
    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{}... ✓", name);
            passed += 1;
        } else {
            println!("{}... ✗", name);
            failed += 1;
        }
    };

    let mov_r1_5 = Instruction::Alu {
        op: Opcode::Mov,
        src1: Reg::from_bits(0),
        operand2: Operand::Imm(5),
        dest: Reg::from_bits(1),
    };

    check(
        "Encode/decode roundtrip",
        decode(encode(&mov_r1_5)) == mov_r1_5,
    );

    check(
        "Reserved condition codes taken",
        Condition::from_bits(0xf).holds(&Flags::default()),
    );

    let mut cpu = Cpu::new(Program::from_words(&[encode(&mov_r1_5)]));
    let run = cpu.run();
    check(
        "MOV immediate program",
        run.is_ok() && cpu.is_completed() && cpu.regs.get(Reg::from_bits(1)) == 5,
    );

    let add = Instruction::Alu {
        op: Opcode::Add,
        src1: Reg::from_bits(0),
        operand2: Operand::Reg(Reg::from_bits(1)),
        dest: Reg::from_bits(2),
    };
    let mut cpu = Cpu::new(Program::from_words(&[encode(&add)]));
    cpu.load_registers([(Reg::from_bits(0), u64::MAX), (Reg::from_bits(1), 1)]);
    let run = cpu.run();
    check(
        "ADD overflow sets carry",
        run.is_ok() && cpu.regs.carry && cpu.regs.get(Reg::from_bits(2)) == 0,
    );

    let back = Instruction::Branch {
        cond: Condition::Always,
        back: true,
        magnitude: 1,
    };
    let mut cpu = Cpu::new(Program::from_words(&[encode(&back)]));
    let run = cpu.run();
    check(
        "Backward branch reports error state",
        run.is_ok() && cpu.state == CpuState::Error,
    );

    let words = vcore::assemble("MOV r1, #5\nADD r2, r1, r1").unwrap_or_default();
    check(
        "Assembler emits expected words",
        words.len() == 2 && decode(words[0]) == mov_r1_5,
    );

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
