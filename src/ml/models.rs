// ============================================================
// Layer 5 — Model Factory
// ============================================================
// The five architectures, all consuming [batch, seq_len, n_channels]
// episode tensors and producing [batch, 2] logits through the
// SequenceClassifier trait.
//
// Every config derives its layer widths from the scenario
// dimensions handed over by the loader, and carries the sizing
// policies the benchmark depends on:
//
//   - MLP: the depth-0 layer is sized from the flattened episode
//     (seq_len * n_channels); deeper layers are hidden -> hidden.
//   - CNN: a pooling stage is inserted after a conv block only
//     while the running sequence length exceeds 2, so pooling can
//     never collapse the sequence to nothing; the classifier head
//     is sized from the post-pooling length.
//   - Transformer: episodes are attended along the channel axis
//     (d_model = seq_len), and the requested head count is
//     decremented until it divides the sequence length.
//
// RNN and LSTM recurrences are written out against Linear layers
// rather than a framework recurrent module, which keeps the
// bidirectional concatenation and gate layout explicit.

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        conv::{Conv1d, Conv1dConfig},
        pool::{MaxPool1d, MaxPool1dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear,
        LinearConfig, PaddingConfig1d,
    },
    prelude::*,
    tensor::activation,
};

use crate::domain::experiment::Nonlinearity;

/// Binary outcome: the positive/negative logit pair.
pub const N_CLASSES: usize = 2;

const DEFAULT_HIDDEN_DIM: usize = 512;

/// Common forward surface of all five architectures.
///
/// Input shape [batch, seq_len, n_channels], output [batch, 2].
pub trait SequenceClassifier<B: Backend> {
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2>;
}

// Modules store the activation as a plain bool constant (true =
// tanh) so the derive treats it as a non-learnable field.
fn activate<B: Backend, const D: usize>(tanh: bool, x: Tensor<B, D>) -> Tensor<B, D> {
    if tanh {
        activation::tanh(x)
    } else {
        activation::relu(x)
    }
}

fn is_tanh(nonlinearity: Nonlinearity) -> bool {
    matches!(nonlinearity, Nonlinearity::Tanh)
}

// ─── MLP ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MlpConfig {
    pub n_channels: usize,
    pub seq_len: usize,
    pub hidden_dim: usize,
    pub n_layers: usize,
    pub dropout: f64,
    pub nonlinearity: Nonlinearity,
}

impl MlpConfig {
    pub fn new(n_channels: usize, seq_len: usize) -> Self {
        Self {
            n_channels,
            seq_len,
            hidden_dim: DEFAULT_HIDDEN_DIM,
            n_layers: 3,
            dropout: 0.0,
            nonlinearity: Nonlinearity::Relu,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        let blocks = (0..self.n_layers)
            .map(|depth| {
                // Depth 0 consumes the flattened episode.
                let in_features = if depth == 0 {
                    self.seq_len * self.n_channels
                } else {
                    self.hidden_dim
                };
                DenseBlock {
                    linear: LinearConfig::new(in_features, self.hidden_dim).init(device),
                    dropout: DropoutConfig::new(self.dropout).init(),
                }
            })
            .collect();

        Mlp {
            blocks,
            head: LinearConfig::new(self.hidden_dim, N_CLASSES).init(device),
            tanh: is_tanh(self.nonlinearity),
        }
    }
}

#[derive(Module, Debug)]
struct DenseBlock<B: Backend> {
    linear: Linear<B>,
    dropout: Dropout,
}

#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    blocks: Vec<DenseBlock<B>>,
    head: Linear<B>,
    tanh: bool,
}

impl<B: Backend> SequenceClassifier<B> for Mlp<B> {
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, seq_len, n_channels] = input.dims();
        let mut x = input.reshape([batch, seq_len * n_channels]);
        for block in &self.blocks {
            x = block.dropout.forward(activate(self.tanh, block.linear.forward(x)));
        }
        self.head.forward(x)
    }
}

// ─── CNN ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CnnConfig {
    pub n_channels: usize,
    pub seq_len: usize,
    pub hidden_dim: usize,
    pub n_layers: usize,
    pub kernel_size: usize,
    pub nonlinearity: Nonlinearity,
}

impl CnnConfig {
    pub fn new(n_channels: usize, seq_len: usize) -> Self {
        Self {
            n_channels,
            seq_len,
            hidden_dim: DEFAULT_HIDDEN_DIM,
            n_layers: 3,
            kernel_size: 3,
            nonlinearity: Nonlinearity::Relu,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Cnn<B> {
        let mut blocks = Vec::with_capacity(self.n_layers);
        let mut pool_after = Vec::with_capacity(self.n_layers);
        let mut n_pools = 0u32;

        for depth in 0..self.n_layers {
            let in_channels = if depth == 0 { self.n_channels } else { self.hidden_dim };
            blocks.push(ConvBlock {
                conv: Conv1dConfig::new(in_channels, self.hidden_dim, self.kernel_size)
                    .with_stride(1)
                    .with_padding(PaddingConfig1d::Explicit(1))
                    .init(device),
                norm: BatchNormConfig::new(self.hidden_dim).init(device),
            });
            // Pool only while the running length still exceeds 2.
            if self.seq_len / 2usize.pow(n_pools) > 2 {
                pool_after.push(true);
                n_pools += 1;
            } else {
                pool_after.push(false);
            }
        }

        let final_len = pooled_len(self.seq_len, self.n_layers);
        Cnn {
            blocks,
            pool_after,
            pool: MaxPool1dConfig::new(2).with_stride(2).init(),
            head: LinearConfig::new(self.hidden_dim * final_len, N_CLASSES).init(device),
            tanh: is_tanh(self.nonlinearity),
        }
    }
}

/// Sequence length after the pooling stages a depth-n CNN inserts.
///
/// A stage is inserted per conv block while the running length
/// exceeds 2, so the result is always at least 1.
pub fn pooled_len(seq_len: usize, n_layers: usize) -> usize {
    let mut n_pools = 0u32;
    for _ in 0..n_layers {
        if seq_len / 2usize.pow(n_pools) > 2 {
            n_pools += 1;
        }
    }
    seq_len / 2usize.pow(n_pools)
}

#[derive(Module, Debug)]
struct ConvBlock<B: Backend> {
    conv: Conv1d<B>,
    norm: BatchNorm<B, 1>,
}

#[derive(Module, Debug)]
pub struct Cnn<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    pool_after: Vec<bool>,
    pool: MaxPool1d,
    head: Linear<B>,
    tanh: bool,
}

impl<B: Backend> SequenceClassifier<B> for Cnn<B> {
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        // Conv1d expects [batch, channels, length].
        let mut x = input.swap_dims(1, 2);
        for (block, &pool_here) in self.blocks.iter().zip(self.pool_after.iter()) {
            x = activate(self.tanh, block.norm.forward(block.conv.forward(x)));
            if pool_here {
                x = self.pool.forward(x);
            }
        }
        let [batch, channels, length] = x.dims();
        self.head.forward(x.reshape([batch, channels * length]))
    }
}

// ─── RNN ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RnnConfig {
    pub n_channels: usize,
    pub seq_len: usize,
    pub hidden_dim: usize,
    pub n_layers: usize,
    pub bidirectional: bool,
    pub dropout: f64,
    pub nonlinearity: Nonlinearity,
}

impl RnnConfig {
    pub fn new(n_channels: usize, seq_len: usize) -> Self {
        Self {
            n_channels,
            seq_len,
            hidden_dim: DEFAULT_HIDDEN_DIM,
            n_layers: 1,
            bidirectional: true,
            dropout: 0.0,
            nonlinearity: Nonlinearity::Tanh,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Rnn<B> {
        let directions = if self.bidirectional { 2 } else { 1 };
        let layers = (0..self.n_layers)
            .map(|depth| {
                let d_input = if depth == 0 {
                    self.n_channels
                } else {
                    directions * self.hidden_dim
                };
                RecurrentLayer {
                    fwd: RecurrentCell::init(d_input, self.hidden_dim, device),
                    bwd: self
                        .bidirectional
                        .then(|| RecurrentCell::init(d_input, self.hidden_dim, device)),
                }
            })
            .collect();

        Rnn {
            layers,
            dropout: DropoutConfig::new(self.dropout).init(),
            head: LinearConfig::new(directions * self.seq_len * self.hidden_dim, N_CLASSES)
                .init(device),
            tanh: is_tanh(self.nonlinearity),
        }
    }
}

/// One direction of a vanilla recurrence: h_t = act(W_x x_t + W_h h_{t-1}).
#[derive(Module, Debug)]
struct RecurrentCell<B: Backend> {
    input: Linear<B>,
    hidden: Linear<B>,
    d_input: usize,
    d_hidden: usize,
}

impl<B: Backend> RecurrentCell<B> {
    fn init(d_input: usize, d_hidden: usize, device: &B::Device) -> Self {
        Self {
            input: LinearConfig::new(d_input, d_hidden).init(device),
            hidden: LinearConfig::new(d_hidden, d_hidden).init(device),
            d_input,
            d_hidden,
        }
    }

    /// Run over the whole sequence; output [batch, seq, hidden] in
    /// original time order regardless of scan direction.
    fn forward_seq(&self, x: &Tensor<B, 3>, tanh: bool, reverse: bool) -> Tensor<B, 3> {
        let [batch, seq_len, _] = x.dims();
        let device = x.device();
        let mut h = Tensor::<B, 2>::zeros([batch, self.d_hidden], &device);
        let mut outputs = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let step = if reverse { seq_len - 1 - t } else { t };
            let xt = x
                .clone()
                .slice([0..batch, step..step + 1, 0..self.d_input])
                .reshape([batch, self.d_input]);
            h = activate(tanh, self.input.forward(xt) + self.hidden.forward(h));
            outputs.push(h.clone().reshape([batch, 1, self.d_hidden]));
        }
        if reverse {
            outputs.reverse();
        }
        Tensor::cat(outputs, 1)
    }
}

#[derive(Module, Debug)]
struct RecurrentLayer<B: Backend> {
    fwd: RecurrentCell<B>,
    bwd: Option<RecurrentCell<B>>,
}

#[derive(Module, Debug)]
pub struct Rnn<B: Backend> {
    layers: Vec<RecurrentLayer<B>>,
    dropout: Dropout,
    head: Linear<B>,
    tanh: bool,
}

impl<B: Backend> SequenceClassifier<B> for Rnn<B> {
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let mut x = input;
        let depth = self.layers.len();
        for (i, layer) in self.layers.iter().enumerate() {
            let forward = layer.fwd.forward_seq(&x, self.tanh, false);
            let out = match &layer.bwd {
                Some(bwd) => {
                    let backward = bwd.forward_seq(&x, self.tanh, true);
                    Tensor::cat(vec![forward, backward], 2)
                }
                None => forward,
            };
            // Inter-layer dropout only, as in the stacked-RNN convention.
            x = if i + 1 < depth { self.dropout.forward(out) } else { out };
        }
        let [batch, seq_len, features] = x.dims();
        self.head.forward(x.reshape([batch, seq_len * features]))
    }
}

// ─── LSTM ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LstmConfig {
    pub n_channels: usize,
    pub seq_len: usize,
    pub hidden_dim: usize,
    pub n_layers: usize,
    pub bidirectional: bool,
    pub dropout: f64,
}

impl LstmConfig {
    pub fn new(n_channels: usize, seq_len: usize) -> Self {
        Self {
            n_channels,
            seq_len,
            hidden_dim: DEFAULT_HIDDEN_DIM,
            n_layers: 1,
            bidirectional: true,
            dropout: 0.0,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Lstm<B> {
        let directions = if self.bidirectional { 2 } else { 1 };
        let layers = (0..self.n_layers)
            .map(|depth| {
                let d_input = if depth == 0 {
                    self.n_channels
                } else {
                    directions * self.hidden_dim
                };
                LstmLayer {
                    fwd: LstmCell::init(d_input, self.hidden_dim, device),
                    bwd: self
                        .bidirectional
                        .then(|| LstmCell::init(d_input, self.hidden_dim, device)),
                }
            })
            .collect();

        Lstm {
            layers,
            dropout: DropoutConfig::new(self.dropout).init(),
            head: LinearConfig::new(directions * self.seq_len * self.hidden_dim, N_CLASSES)
                .init(device),
        }
    }
}

/// One direction of an LSTM: the four gates are computed in one
/// fused projection and sliced apart (i, f, g, o order).
#[derive(Module, Debug)]
struct LstmCell<B: Backend> {
    gates_input: Linear<B>,
    gates_hidden: Linear<B>,
    d_input: usize,
    d_hidden: usize,
}

impl<B: Backend> LstmCell<B> {
    fn init(d_input: usize, d_hidden: usize, device: &B::Device) -> Self {
        Self {
            gates_input: LinearConfig::new(d_input, 4 * d_hidden).init(device),
            gates_hidden: LinearConfig::new(d_hidden, 4 * d_hidden).init(device),
            d_input,
            d_hidden,
        }
    }

    fn forward_seq(&self, x: &Tensor<B, 3>, reverse: bool) -> Tensor<B, 3> {
        let [batch, seq_len, _] = x.dims();
        let device = x.device();
        let d = self.d_hidden;
        let mut h = Tensor::<B, 2>::zeros([batch, d], &device);
        let mut c = Tensor::<B, 2>::zeros([batch, d], &device);
        let mut outputs = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let step = if reverse { seq_len - 1 - t } else { t };
            let xt = x
                .clone()
                .slice([0..batch, step..step + 1, 0..self.d_input])
                .reshape([batch, self.d_input]);
            let gates = self.gates_input.forward(xt) + self.gates_hidden.forward(h);

            let input_gate = activation::sigmoid(gates.clone().slice([0..batch, 0..d]));
            let forget_gate = activation::sigmoid(gates.clone().slice([0..batch, d..2 * d]));
            let cell_gate = activation::tanh(gates.clone().slice([0..batch, 2 * d..3 * d]));
            let output_gate = activation::sigmoid(gates.slice([0..batch, 3 * d..4 * d]));

            c = forget_gate * c + input_gate * cell_gate;
            h = output_gate * activation::tanh(c.clone());
            outputs.push(h.clone().reshape([batch, 1, d]));
        }
        if reverse {
            outputs.reverse();
        }
        Tensor::cat(outputs, 1)
    }
}

#[derive(Module, Debug)]
struct LstmLayer<B: Backend> {
    fwd: LstmCell<B>,
    bwd: Option<LstmCell<B>>,
}

#[derive(Module, Debug)]
pub struct Lstm<B: Backend> {
    layers: Vec<LstmLayer<B>>,
    dropout: Dropout,
    head: Linear<B>,
}

impl<B: Backend> SequenceClassifier<B> for Lstm<B> {
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let mut x = input;
        let depth = self.layers.len();
        for (i, layer) in self.layers.iter().enumerate() {
            let forward = layer.fwd.forward_seq(&x, false);
            let out = match &layer.bwd {
                Some(bwd) => Tensor::cat(vec![forward, bwd.forward_seq(&x, true)], 2),
                None => forward,
            };
            x = if i + 1 < depth { self.dropout.forward(out) } else { out };
        }
        let [batch, seq_len, features] = x.dims();
        self.head.forward(x.reshape([batch, seq_len * features]))
    }
}

// ─── Transformer ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TransformerConfig {
    pub n_channels: usize,
    pub seq_len: usize,
    pub hidden_dim: usize,
    pub n_layers: usize,
    pub n_heads: usize,
    pub dropout: f64,
}

impl TransformerConfig {
    pub fn new(n_channels: usize, seq_len: usize) -> Self {
        Self {
            n_channels,
            seq_len,
            hidden_dim: DEFAULT_HIDDEN_DIM,
            n_layers: 3,
            n_heads: 8,
            dropout: 0.0,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerNet<B> {
        let n_heads = resolve_heads(self.seq_len, self.n_heads);
        let blocks = (0..self.n_layers)
            .map(|_| self.build_encoder_block(n_heads, device))
            .collect();

        TransformerNet {
            blocks,
            head: LinearConfig::new(self.seq_len * self.n_channels, N_CLASSES).init(device),
        }
    }

    fn build_encoder_block<B: Backend>(
        &self,
        n_heads: usize,
        device: &B::Device,
    ) -> EncoderBlock<B> {
        // d_model is the sequence length: attention runs across the
        // channel tokens of each episode.
        EncoderBlock {
            self_attn: MultiHeadAttentionConfig::new(self.seq_len, n_heads)
                .with_dropout(self.dropout)
                .init(device),
            ffn_linear1: LinearConfig::new(self.seq_len, self.hidden_dim).init(device),
            ffn_linear2: LinearConfig::new(self.hidden_dim, self.seq_len).init(device),
            norm1: LayerNormConfig::new(self.seq_len).init(device),
            norm2: LayerNormConfig::new(self.seq_len).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Largest head count <= requested that divides the sequence length.
///
/// Attention runs along the channel axis with d_model = seq_len,
/// so the head count must divide seq_len. Bottoms out at 1.
pub fn resolve_heads(seq_len: usize, requested: usize) -> usize {
    let mut n_heads = requested.max(1);
    while seq_len % n_heads != 0 {
        n_heads -= 1;
    }
    n_heads
}

#[derive(Module, Debug)]
struct EncoderBlock<B: Backend> {
    self_attn: MultiHeadAttention<B>,
    ffn_linear1: Linear<B>,
    ffn_linear2: Linear<B>,
    norm1: LayerNorm<B>,
    norm2: LayerNorm<B>,
    dropout: Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let attn_out = self.self_attn.forward(MhaInput::self_attn(x.clone())).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_out));
        let ffn_out = self
            .ffn_linear2
            .forward(activation::gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct TransformerNet<B: Backend> {
    blocks: Vec<EncoderBlock<B>>,
    head: Linear<B>,
}

impl<B: Backend> SequenceClassifier<B> for TransformerNet<B> {
    fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        // Channels become the token axis: [batch, n_channels, seq_len].
        let mut x = input.swap_dims(1, 2);
        for block in &self.blocks {
            x = block.forward(x);
        }
        let [batch, n_channels, seq_len] = x.dims();
        self.head.forward(x.reshape([batch, n_channels * seq_len]))
    }
}
