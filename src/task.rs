// 该文件是 Lanshan （岚山） 项目的一部分。
// src/task.rs - 推理任务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{
  sync::{
    Arc, Condvar, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
    mpsc::{self, TrySendError},
  },
  thread,
  time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
  config::ConfidenceFilter,
  decode::DetectionDecoder,
  fps::FrameTiming,
  model::Model,
  output::{FrameReport, Render},
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<TaskSummary, Self::Error>;
}

/// 任务结束时的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskSummary {
  /// 从输入源取得的帧数
  pub captured: usize,
  /// 送入推理的帧数
  pub processed: usize,
  /// 因推理未完成而丢弃的帧数
  pub dropped: usize,
  /// 解码失败而跳过的帧数
  pub skipped: usize,
  /// 交给输出的帧数
  pub rendered: usize,
  /// 渲染未及处理、被更新结果替换的帧数
  pub superseded: usize,
  /// 检测结果总数
  pub detections: usize,
}

/// 安装 Ctrl-C 处理，返回停止标志。每个进程只能调用一次。
pub fn install_ctrlc_handler() -> anyhow::Result<Arc<AtomicBool>> {
  let stop = Arc::new(AtomicBool::new(false));
  let flag = Arc::clone(&stop);
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    flag.store(true, Ordering::SeqCst);
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;
  Ok(stop)
}

/// 单帧处理：推理、解码、可选的置信度过滤
#[derive(Debug, Clone)]
pub struct FrameProcessor {
  decoder: DetectionDecoder,
  filter: Option<ConfidenceFilter>,
}

impl FrameProcessor {
  pub fn new(decoder: DetectionDecoder) -> Self {
    Self {
      decoder,
      filter: None,
    }
  }

  pub fn with_filter(mut self, filter: Option<ConfidenceFilter>) -> Self {
    self.filter = filter;
    self
  }

  pub fn decoder(&self) -> &DetectionDecoder {
    &self.decoder
  }

  /// 解码失败时记录日志并返回 `Ok(None)`，模型错误原样返回。
  pub fn process<M: Model>(
    &self,
    model: &M,
    index: usize,
    frame: &M::Input,
  ) -> Result<Option<FrameReport>, M::Error> {
    let timing = FrameTiming::start();
    let raw = model.infer(frame)?;
    let detections = match self.decoder.decode(&raw) {
      Ok(detections) => detections,
      Err(e) => {
        warn!("第 {} 帧解码失败，跳过: {}", index, e);
        return Ok(None);
      }
    };
    let timing = timing.finish();

    let detections = match self.filter {
      Some(filter) => filter.apply(detections),
      None => detections,
    };

    Ok(Some(FrameReport {
      index,
      detections,
      fps: timing.fps(),
      origin: self.decoder.origin(),
    }))
  }
}

pub struct OneShotTask {
  processor: FrameProcessor,
}

impl OneShotTask {
  pub fn new(processor: FrameProcessor) -> Self {
    Self { processor }
  }
}

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Error = ME>,
  O: Render<F, FrameReport, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");

    let mut summary = TaskSummary {
      captured: 1,
      processed: 1,
      ..Default::default()
    };
    match self.processor.process(&model, 1, &frame)? {
      Some(report) => {
        info!("推理完成，fps: {:.2}", report.fps);
        summary.detections = report.detections.len();
        output.render_result(&frame, &report)?;
        summary.rendered = 1;
        info!("渲染完成");
      }
      None => summary.skipped = 1,
    }

    Ok(summary)
  }
}

pub struct RepeatShotTask {
  processor: FrameProcessor,
  repeat_times: usize,
}

impl RepeatShotTask {
  const REPEAT_TIMES: usize = 1000;
  const WARMUP_TIMES: usize = 2;

  pub fn new(processor: FrameProcessor) -> Self {
    Self {
      processor,
      repeat_times: Self::REPEAT_TIMES,
    }
  }

  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times;
    self
  }
}

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Error = ME>,
  O: Render<F, FrameReport, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");

    let mut summary = TaskSummary {
      captured: 1,
      ..Default::default()
    };
    let mut times = Vec::with_capacity(self.repeat_times);
    for i in 0..self.repeat_times {
      let timing = FrameTiming::start();
      let report = self.processor.process(&model, i + 1, &frame)?;
      let timing = timing.finish();
      summary.processed += 1;
      times.push(timing.elapsed());

      match report {
        Some(report) => {
          info!("({})推理完成，耗时: {:.2?}", i, timing.elapsed());
          summary.detections += report.detections.len();
          output.render_result(&frame, &report)?;
          summary.rendered += 1;
        }
        None => summary.skipped += 1,
      }
    }

    let measured = if times.len() > Self::WARMUP_TIMES {
      &times[Self::WARMUP_TIMES..]
    } else {
      &times[..]
    };
    if !measured.is_empty() {
      warn!(
        "平均推理时间: {:.2?}",
        measured.iter().sum::<Duration>() / measured.len() as u32
      );
    }

    Ok(summary)
  }
}

/// 顺序处理输入源的每一帧，不丢帧
pub struct ContinuousTask {
  processor: FrameProcessor,
  frame_number: Option<usize>,
  stop: Option<Arc<AtomicBool>>,
}

impl ContinuousTask {
  pub fn new(processor: FrameProcessor) -> Self {
    Self {
      processor,
      frame_number: None,
      stop: None,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.stop = Some(stop);
    self
  }
}

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Error = ME>,
  O: Render<F, FrameReport, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let mut summary = TaskSummary::default();

    for frame in input {
      summary.captured += 1;
      summary.processed += 1;
      let frame_index = summary.processed;
      debug!("处理第 {} 帧图像", frame_index);

      match self.processor.process(&model, frame_index, &frame)? {
        Some(report) => {
          summary.detections += report.detections.len();
          output.render_result(&frame, &report)?;
          summary.rendered += 1;
          info!("第 {} 帧完成，fps: {:.2}", frame_index, report.fps);
        }
        None => summary.skipped += 1,
      }

      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if self
        .stop
        .as_ref()
        .map(|stop| stop.load(Ordering::SeqCst))
        .unwrap_or(false)
      {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(summary)
  }
}

/// 单槽交接：新结果覆盖尚未取走的旧结果，读取方总是拿到最新的一份。
struct LatestSlot<T> {
  state: Mutex<SlotState<T>>,
  ready: Condvar,
}

struct SlotState<T> {
  value: Option<T>,
  closed: bool,
}

impl<T> LatestSlot<T> {
  fn new() -> Self {
    Self {
      state: Mutex::new(SlotState {
        value: None,
        closed: false,
      }),
      ready: Condvar::new(),
    }
  }

  /// 放入新值，返回是否替换了未取走的旧值；槽已关闭时原样退回。
  fn put(&self, value: T) -> Result<bool, T> {
    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    if state.closed {
      return Err(value);
    }
    let replaced = state.value.replace(value).is_some();
    self.ready.notify_one();
    Ok(replaced)
  }

  /// 阻塞等待下一个值；关闭后先取完剩余的值再返回 `None`。
  fn take(&self) -> Option<T> {
    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
      if let Some(value) = state.value.take() {
        return Some(value);
      }
      if state.closed {
        return None;
      }
      state = self
        .ready
        .wait(state)
        .unwrap_or_else(PoisonError::into_inner);
    }
  }

  fn close(&self) {
    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    state.closed = true;
    self.ready.notify_all();
  }
}

/// 实时任务：采集、推理、渲染各占一个线程。
///
/// 采集线程通过容量为 1 的通道交付帧，通道已满说明上一帧仍在推理，
/// 当前帧直接丢弃。推理结果放入单槽交接，渲染跟不上时旧结果被最新结果替换，
/// 推理线程不等待渲染完成。
pub struct LiveTask {
  processor: FrameProcessor,
  frame_number: Option<usize>,
  stop: Option<Arc<AtomicBool>>,
}

impl LiveTask {
  pub fn new(processor: FrameProcessor) -> Self {
    Self {
      processor,
      frame_number: None,
      stop: None,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.stop = Some(stop);
    self
  }
}

impl<
  F: Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F> + Send + 'static,
  M: Model<Input = F, Error = ME>,
  O: Render<F, FrameReport, Error = RE> + Send + 'static,
> Task<I, M, O> for LiveTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始实时任务...");
    let stop = self.stop.unwrap_or_default();

    let (frame_tx, frame_rx) = mpsc::sync_channel::<F>(1);
    let capture = thread::Builder::new()
      .name("capture".to_string())
      .spawn({
        let stop = Arc::clone(&stop);
        move || {
          let (mut captured, mut dropped) = (0usize, 0usize);
          for frame in input {
            if stop.load(Ordering::SeqCst) {
              break;
            }
            captured += 1;
            match frame_tx.try_send(frame) {
              Ok(()) => {}
              Err(TrySendError::Full(_)) => {
                dropped += 1;
                debug!("推理未完成，丢弃第 {} 帧", captured);
              }
              Err(TrySendError::Disconnected(_)) => break,
            }
          }
          debug!("采集线程结束: 采集 {} 帧, 丢弃 {} 帧", captured, dropped);
          (captured, dropped)
        }
      })?;

    let slot = Arc::new(LatestSlot::<(F, FrameReport)>::new());
    let render = thread::Builder::new()
      .name("render".to_string())
      .spawn({
        let slot = Arc::clone(&slot);
        move || -> Result<usize, RE> {
          let mut rendered = 0usize;
          while let Some((frame, report)) = slot.take() {
            if let Err(e) = output.render_result(&frame, &report) {
              slot.close();
              return Err(e);
            }
            rendered += 1;
          }
          Ok(rendered)
        }
      })?;

    let mut summary = TaskSummary::default();
    let mut failure = None;
    for frame in frame_rx.iter() {
      summary.processed += 1;
      let frame_index = summary.processed;

      match self.processor.process(&model, frame_index, &frame) {
        Ok(Some(report)) => {
          summary.detections += report.detections.len();
          debug!("第 {} 帧完成，fps: {:.2}", frame_index, report.fps);
          match slot.put((frame, report)) {
            Ok(true) => {
              summary.superseded += 1;
              debug!("渲染未完成，替换上一帧结果");
            }
            Ok(false) => {}
            Err(_) => {
              warn!("渲染线程已退出");
              break;
            }
          }
        }
        Ok(None) => summary.skipped += 1,
        Err(e) => {
          failure = Some(anyhow::Error::from(e));
          break;
        }
      }

      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if stop.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }
    // 关闭通道，采集线程在下一次交付时退出，渲染线程处理完剩余结果后退出
    stop.store(true, Ordering::SeqCst);
    drop(frame_rx);
    slot.close();

    let (captured, dropped) = capture
      .join()
      .map_err(|_| anyhow::anyhow!("采集线程异常退出"))?;
    let rendered = render
      .join()
      .map_err(|_| anyhow::anyhow!("渲染线程异常退出"))?;

    if let Some(e) = failure {
      return Err(e);
    }
    summary.rendered = rendered?;
    summary.captured = captured;
    summary.dropped = dropped;

    info!(
      "任务完成: 采集 {} 帧, 处理 {} 帧, 丢弃 {} 帧, 渲染 {} 帧",
      summary.captured, summary.processed, summary.dropped, summary.rendered
    );
    Ok(summary)
  }
}
