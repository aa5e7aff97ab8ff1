use bevy::app::AppExit;
use bevy::prelude::*;

pub mod events;
pub mod resources;
pub mod states;

/// 核心插件：注册全局资源 / 事件 / 状态
pub struct RuntimePlugin;

impl Plugin for RuntimePlugin {
    fn build(&self, app: &mut App) {
        use states::AppState;

        app.init_state::<AppState>()
            .add_event::<events::LogEvent>()
            .init_resource::<resources::StorageConfig>()
            .add_systems(Startup, |mut next: ResMut<NextState<AppState>>| {
                next.set(AppState::Loading);
            })
            .add_systems(Update, events::forward_log_event)
            .add_systems(OnEnter(AppState::Shutdown), request_exit);
    }
}

fn request_exit(mut app_exit: EventWriter<AppExit>) {
    app_exit.write(AppExit::error());
}
