pub use self::scene_pipeline::ScenePipeline;

mod scene_pipeline;
