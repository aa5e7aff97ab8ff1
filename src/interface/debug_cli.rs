//! 文字 CLI：读取 stdin → 解析命令 → 发出单元事件

use bevy::app::AppExit;
use bevy::prelude::*;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::aspect::DisplayOrder;
use crate::cell::components::CellDrive;
use crate::cell::events::*;
use crate::data::schema::TierKind;
use crate::data::Catalog;
use crate::runtime::{events::LogEvent, states::AppState};

static CLI_BUFFER: Lazy<Arc<Mutex<VecDeque<String>>>> =
    Lazy::new(|| Arc::new(Mutex::new(VecDeque::new())));

/// 插件入口
pub struct DebugCliPlugin;
impl Plugin for DebugCliPlugin {
    fn build(&self, app: &mut App) {
        {
            let buffer = CLI_BUFFER.clone();
            std::thread::spawn(move || {
                use std::io::{self, BufRead};
                let stdin = io::stdin();
                for line in stdin.lock().lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    // 主线程 panic 后锁会中毒，此时直接结束读取
                    let Ok(mut buf) = buffer.lock() else { break };
                    buf.push_back(line.to_string());
                }
            });
        }
        app
            // 事件：原始输入行
            .add_event::<CliLine>()
            // 每帧从 buffer 取出所有命令行写入事件
            .add_systems(Update, read_stdin)
            // 仅在 InGame 处理命令
            .add_systems(
                Update,
                execute_cli_commands
                    .run_if(in_state(AppState::InGame))
                    .before(crate::cell::CellSystems),
            );
    }
}

/* ---------------------------- 事件与枚举 ---------------------------- */

/// 终端敲的一整行
#[derive(Event)]
struct CliLine(String);

/// 我们支持的命令
#[derive(Debug, PartialEq)]
enum Command {
    Help,
    Status,
    Exit,
    Aspects,
    Tiers,
    Cells,
    New {
        label: String,
        tier: String,
        bound: Option<String>,
    },
    Insert {
        label: String,
        aspect: String,
        amount: u64,
    },
    Extract {
        label: String,
        aspect: String,
        amount: u64,
    },
    Partition {
        label: String,
        aspects: Vec<String>,
    },
    Contents {
        label: String,
        order: DisplayOrder,
    },
    Detach(String),
    Usage(&'static str),
    Unsupported(String),
}

/* ---------------------------- 读取 stdin ---------------------------- */

fn read_stdin(mut writer: EventWriter<CliLine>) {
    let Ok(mut buffer) = CLI_BUFFER.lock() else {
        return;
    };
    while let Some(line) = buffer.pop_front() {
        writer.write(CliLine(line));
    }
}

/* ---------------------------- 命令执行 ---------------------------- */

#[allow(clippy::too_many_arguments)]
fn execute_cli_commands(
    mut line_reader: EventReader<CliLine>,
    mut app_exit: EventWriter<AppExit>,
    mut log: EventWriter<LogEvent>,
    state: Res<State<AppState>>,
    catalog: Res<Catalog>,
    drive: Res<CellDrive>,
    mut ev_create: EventWriter<CreateCell>,
    mut ev_insert: EventWriter<InsertAspect>,
    mut ev_extract: EventWriter<ExtractAspect>,
    mut ev_partition: EventWriter<SetPartition>,
    mut ev_describe: EventWriter<DescribeCell>,
    mut ev_list: EventWriter<ListCells>,
    mut ev_detach: EventWriter<DetachStorage>,
) {
    for CliLine(input) in line_reader.read() {
        match parse_command(input) {
            Command::Help => {
                log.write(LogEvent(
                    "命令列表:
  help                              查看帮助
  status                            查看当前状态
  exit / quit                       退出程序
  aspects                           列出所有要素
  tiers                             列出单元类型
  cells                             列出已挂载单元
  new <label> <tier> [aspect]       挂载单元（量子 / 奇点需指定要素）
  insert <label> <aspect> <n>       放入要素
  extract <label> <aspect> <n>      取出要素
  partition <label> [aspect..]      设置分区（不带参数即解除）
  contents <label> [name|tag|amount]  查看单元内容
  detach <label>                    拆出空单元的存储元件
  "
                    .into(),
                ));
            }

            Command::Status => {
                log.write(LogEvent(format!(
                    "State: {:?}, Aspects: {}, Cells: {}, Idle drain: {} AE/t",
                    state.get(),
                    catalog.registry.len(),
                    drive.len(),
                    drive.idle_drain()
                )));
            }

            Command::Exit => {
                log.write(LogEvent("Bye~".into()));
                app_exit.write(AppExit::Success);
            }

            Command::Aspects => {
                for (kind, def) in catalog.registry.iter() {
                    log.write(LogEvent(format!(
                        "{:>3} | {} | {} | {}/byte",
                        kind.index(),
                        def.tag,
                        def.name,
                        def.units_per_byte
                    )));
                }
            }

            Command::Tiers => {
                for tier in &catalog.tiers {
                    let shape = match &tier.kind {
                        TierKind::Finite {
                            capacity,
                            max_types,
                        } => format!("{capacity} bytes, {max_types} types"),
                        TierKind::Creative => "creative".to_string(),
                        TierKind::Quantum | TierKind::Singularity => {
                            "single aspect, unbounded".to_string()
                        }
                    };
                    log.write(LogEvent(format!(
                        "{} | {} | {shape} | {} AE/t",
                        tier.id, tier.name, tier.idle_drain
                    )));
                }
            }

            Command::Cells => {
                ev_list.write(ListCells);
            }

            Command::New { label, tier, bound } => {
                ev_create.write(CreateCell { label, tier, bound });
            }

            Command::Insert {
                label,
                aspect,
                amount,
            } => {
                ev_insert.write(InsertAspect {
                    label,
                    aspect,
                    amount,
                });
            }

            Command::Extract {
                label,
                aspect,
                amount,
            } => {
                ev_extract.write(ExtractAspect {
                    label,
                    aspect,
                    amount,
                });
            }

            Command::Partition { label, aspects } => {
                ev_partition.write(SetPartition { label, aspects });
            }

            Command::Contents { label, order } => {
                ev_describe.write(DescribeCell { label, order });
            }

            Command::Detach(label) => {
                ev_detach.write(DetachStorage { label });
            }

            Command::Usage(usage) => {
                log.write(LogEvent(format!("用法: {usage}")));
            }

            Command::Unsupported(cmd) => {
                log.write(LogEvent(format!("不支持的命令: {cmd}")));
            }
        }
    }
}

/* ---------------------------- 工具函数 ---------------------------- */

fn parse_command(input: &str) -> Command {
    let mut parts = input.split_whitespace();
    let cmd = parts.next().unwrap_or("").to_lowercase();
    let mut arg = || parts.next().map(str::to_string);
    match cmd.as_str() {
        "help" | "h" | "?" => Command::Help,
        "status" | "s" => Command::Status,
        "exit" | "quit" | "q" => Command::Exit,
        "aspects" | "a" => Command::Aspects,
        "tiers" | "t" => Command::Tiers,
        "cells" | "ls" => Command::Cells,
        "new" => match (arg(), arg()) {
            (Some(label), Some(tier)) => Command::New {
                label,
                tier,
                bound: arg(),
            },
            _ => Command::Usage("new <label> <tier> [aspect]"),
        },
        "insert" | "in" => match (arg(), arg()) {
            (Some(label), Some(aspect)) => Command::Insert {
                label,
                aspect,
                amount: arg().and_then(|n| n.parse().ok()).unwrap_or(1),
            },
            _ => Command::Usage("insert <label> <aspect> <n>"),
        },
        "extract" | "out" => match (arg(), arg()) {
            (Some(label), Some(aspect)) => Command::Extract {
                label,
                aspect,
                amount: arg().and_then(|n| n.parse().ok()).unwrap_or(1),
            },
            _ => Command::Usage("extract <label> <aspect> <n>"),
        },
        "partition" | "p" => match arg() {
            Some(label) => Command::Partition {
                label,
                aspects: std::iter::from_fn(&mut arg).collect(),
            },
            None => Command::Usage("partition <label> [aspect..]"),
        },
        "contents" | "c" => match arg() {
            Some(label) => Command::Contents {
                label,
                order: arg()
                    .and_then(|o| DisplayOrder::parse(&o))
                    .unwrap_or_default(),
            },
            None => Command::Usage("contents <label> [name|tag|amount]"),
        },
        "detach" => match arg() {
            Some(label) => Command::Detach(label),
            None => Command::Usage("detach <label>"),
        },
        other => Command::Unsupported(other.into()),
    }
}
