use super::{components::*, events::*};
use crate::aspect::{AspectKind, AspectRegistry, DisplayOrder};
use crate::data::Catalog;
use crate::data::schema::TierKind;
use crate::runtime::events::LogEvent;
use crate::storage::{Capacity, CellError, CellHandle};
use bevy::prelude::*;

/// 处理 "new"：按等级挂载单元
pub fn create_cells(
    mut ev_create: EventReader<CreateCell>,
    catalog: Res<Catalog>,
    mut drive: ResMut<CellDrive>,
    mut log: EventWriter<LogEvent>,
    mut changed: EventWriter<CellChanged>,
) {
    for ev in ev_create.read() {
        let Some(tier) = catalog.tier(&ev.tier) else {
            log.write(LogEvent(format!("未知单元类型: {}", ev.tier)));
            continue;
        };

        let bound = match ev.bound.as_deref().map(|tag| catalog.registry.resolve(tag)) {
            Some(Ok(kind)) => Some(kind),
            Some(Err(err)) => {
                log.write(LogEvent(format!("挂载失败: {err}")));
                continue;
            }
            None => None,
        };

        let policy = match tier.policy(bound) {
            Ok(policy) => policy,
            Err(err) => {
                log.write(LogEvent(format!("挂载失败: {err}")));
                continue;
            }
        };

        match drive.mount(&ev.label, catalog.registry.clone(), policy) {
            Ok(cell) => {
                info!("mounted cell {} ({})", ev.label, cell.medium());
                log.write(LogEvent(format!("已挂载 {} [{}]", ev.label, tier.name)));
                changed.write(CellChanged {
                    label: ev.label.clone(),
                    status: cell.status(),
                });
            }
            Err(err) => {
                warn!("mount {} failed: {err}", ev.label);
                log.write(LogEvent(format!("挂载失败: {err}")));
            }
        }
    }
}

/// 处理 "insert"：放不下的部分退回来源
pub fn insert_aspects(
    mut ev_insert: EventReader<InsertAspect>,
    catalog: Res<Catalog>,
    mut drive: ResMut<CellDrive>,
    mut log: EventWriter<LogEvent>,
    mut changed: EventWriter<CellChanged>,
) {
    for ev in ev_insert.read() {
        let Some(cell) = drive.get_mut(&ev.label) else {
            log.write(LogEvent(format!("单元 {} 不存在", ev.label)));
            continue;
        };

        let result = catalog
            .registry
            .resolve(&ev.aspect)
            .and_then(|kind| Ok((kind, cell.insert(kind, ev.amount)?)));

        match result {
            Ok((kind, accepted)) => {
                let name = display_name(&catalog.registry, kind);
                let rest = ev.amount - accepted;
                if rest > 0 {
                    log.write(LogEvent(format!(
                        "{}: 放入 {name} ×{accepted}，{rest} 无法存入",
                        ev.label
                    )));
                } else {
                    log.write(LogEvent(format!("{}: 放入 {name} ×{accepted}", ev.label)));
                }
                if accepted > 0 {
                    changed.write(CellChanged {
                        label: ev.label.clone(),
                        status: cell.status(),
                    });
                }
            }
            Err(err) => report_error(&mut log, &ev.label, &err),
        }
    }
}

/// 处理 "extract"
pub fn extract_aspects(
    mut ev_extract: EventReader<ExtractAspect>,
    catalog: Res<Catalog>,
    mut drive: ResMut<CellDrive>,
    mut log: EventWriter<LogEvent>,
    mut changed: EventWriter<CellChanged>,
) {
    for ev in ev_extract.read() {
        let Some(cell) = drive.get_mut(&ev.label) else {
            log.write(LogEvent(format!("单元 {} 不存在", ev.label)));
            continue;
        };

        let result = catalog
            .registry
            .resolve(&ev.aspect)
            .and_then(|kind| Ok((kind, cell.extract(kind, ev.amount)?)));

        match result {
            Ok((kind, removed)) => {
                let name = display_name(&catalog.registry, kind);
                log.write(LogEvent(format!("{}: 取出 {name} ×{removed}", ev.label)));
                if removed > 0 {
                    changed.write(CellChanged {
                        label: ev.label.clone(),
                        status: cell.status(),
                    });
                }
            }
            Err(err) => report_error(&mut log, &ev.label, &err),
        }
    }
}

/// 处理 "partition"
pub fn apply_partitions(
    mut ev_partition: EventReader<SetPartition>,
    catalog: Res<Catalog>,
    mut drive: ResMut<CellDrive>,
    mut log: EventWriter<LogEvent>,
) {
    for ev in ev_partition.read() {
        let Some(cell) = drive.get_mut(&ev.label) else {
            log.write(LogEvent(format!("单元 {} 不存在", ev.label)));
            continue;
        };

        let result = ev
            .aspects
            .iter()
            .map(|tag| catalog.registry.resolve(tag))
            .collect::<Result<Vec<_>, _>>()
            .and_then(|kinds| cell.set_partition(kinds));

        match result {
            Ok(()) if cell.is_partitioned() => {
                log.write(LogEvent(format!("{}: 已分区", ev.label)));
            }
            Ok(()) => {
                log.write(LogEvent(format!("{}: 已解除分区", ev.label)));
            }
            Err(err) => report_error(&mut log, &ev.label, &err),
        }
    }
}

/// 打印单元详情：容量、分区、内容
pub fn describe_cells(
    mut ev_describe: EventReader<DescribeCell>,
    catalog: Res<Catalog>,
    drive: Res<CellDrive>,
    mut log: EventWriter<LogEvent>,
) {
    for ev in ev_describe.read() {
        let Some(cell) = drive.get(&ev.label) else {
            log.write(LogEvent(format!("单元 {} 不存在", ev.label)));
            continue;
        };
        for line in describe(cell, &catalog.registry, ev.order) {
            log.write(LogEvent(line));
        }
    }
}

/// 列出所有单元
pub fn list_cells(
    mut ev_list: EventReader<ListCells>,
    drive: Res<CellDrive>,
    mut log: EventWriter<LogEvent>,
) {
    if ev_list.is_empty() {
        return;
    }
    ev_list.clear();

    if drive.is_empty() {
        log.write(LogEvent("  (empty)".into()));
        return;
    }
    for (label, cell) in drive.iter() {
        let report = cell.report_capacity();
        log.write(LogEvent(format!(
            "[{label}] {:?} | {} / {} bytes | {} / {} types | {} AE/t",
            cell.status(),
            report.used_bytes,
            fmt_capacity(report.total_bytes),
            report.used_types,
            fmt_capacity(report.total_types),
            cell.idle_upkeep_cost()
        )));
    }
    log.write(LogEvent(format!("总待机能耗: {} AE/t", drive.idle_drain())));
}

/// 处理 "detach"：空单元拆出存储元件
pub fn detach_storage(
    mut ev_detach: EventReader<DetachStorage>,
    catalog: Res<Catalog>,
    mut drive: ResMut<CellDrive>,
    mut log: EventWriter<LogEvent>,
    mut detached: EventWriter<StorageDetached>,
    mut changed: EventWriter<CellChanged>,
) {
    for ev in ev_detach.read() {
        match drive.detach(&ev.label) {
            Ok(Some(component)) => {
                let tier = catalog.tiers.iter().find(|tier| {
                    tier.kind
                        == TierKind::Finite {
                            capacity: component.total_bytes,
                            max_types: component.total_types,
                        }
                });
                let shown = tier.map_or_else(
                    || format!("{} bytes", component.total_bytes),
                    |tier| tier.name.clone(),
                );
                log.write(LogEvent(format!("{}: 已拆出存储元件 [{shown}]", ev.label)));
                detached.write(StorageDetached {
                    label: ev.label.clone(),
                    tier: tier.map(|tier| tier.id.clone()),
                    component,
                });
                changed.write(CellChanged {
                    label: ev.label.clone(),
                    status: drive.status(&ev.label),
                });
            }
            Ok(None) => {
                log.write(LogEvent(format!("{}: 无法拆出存储元件", ev.label)));
            }
            Err(err) => report_error(&mut log, &ev.label, &err),
        }
    }
}

/* ---------------------------- 工具函数 ---------------------------- */

fn report_error(log: &mut EventWriter<LogEvent>, label: &str, err: &CellError) {
    warn!("cell {label}: {err}");
    log.write(LogEvent(format!("{label}: {err}")));
}

fn display_name(registry: &AspectRegistry, kind: AspectKind) -> String {
    registry
        .get(kind)
        .map_or_else(|_| format!("#{}", kind.index()), |def| def.name.clone())
}

fn fmt_capacity(capacity: Capacity) -> String {
    match capacity {
        Capacity::Limited(n) => n.to_string(),
        Capacity::Unbounded => "∞".into(),
    }
}

/// 展示层：把结构化报告排成文字
pub fn describe(
    cell: &CellHandle,
    registry: &AspectRegistry,
    order: DisplayOrder,
) -> Vec<String> {
    let report = cell.report_capacity();
    let mut lines = vec![
        format!(
            "{} / {} bytes",
            report.used_bytes,
            fmt_capacity(report.total_bytes)
        ),
        format!(
            "{} / {} types",
            report.used_types,
            fmt_capacity(report.total_types)
        ),
    ];

    let partition = cell.describe_partition(order);
    if !partition.is_empty() {
        lines.push("Partitioned:".into());
        lines.extend(
            partition
                .into_iter()
                .map(|kind| format!("  {}", display_name(registry, kind))),
        );
    }

    let contents = cell.describe_contents(order);
    if !contents.is_empty() {
        lines.push("Contains:".into());
        lines.extend(
            contents
                .iter()
                .map(|q| format!("  {} x {}", display_name(registry, q.kind), q.amount)),
        );
    }
    lines
}
